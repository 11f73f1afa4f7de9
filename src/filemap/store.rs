//! Resolves (file id, map kind) pairs to on-disk paths and opens the maps.

use super::{FileMap, MapFlags, write_map};
use crate::error::MapResult;
use crate::symbol::Symbol;
use crate::types::{FileId, Location};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// The four per-file map kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKind {
    Symbols,
    SymbolNames,
    Targets,
    Usrs,
}

impl MapKind {
    pub const ALL: [MapKind; 4] = [
        MapKind::Symbols,
        MapKind::SymbolNames,
        MapKind::Targets,
        MapKind::Usrs,
    ];

    /// File name inside the per-file map directory.
    pub fn short_name(self) -> &'static str {
        match self {
            MapKind::Symbols => "symbols",
            MapKind::SymbolNames => "symnames",
            MapKind::Targets => "targets",
            MapKind::Usrs => "usrs",
        }
    }
}

/// Location → every symbol occurrence at that point.
pub type SymbolMap = FileMap<Location, Symbol>;
/// Qualified name → locations carrying that name.
pub type NameMap = FileMap<String, BTreeSet<Location>>;
/// USR → locations (referencing for `targets`, declaring for `usrs`).
pub type UsrMap = FileMap<String, BTreeSet<Location>>;

/// Opener for the per-file maps under `<base>/<fileId>/<kind>`.
#[derive(Debug, Clone)]
pub struct FileMapStore {
    base: PathBuf,
    flags: MapFlags,
}

impl FileMapStore {
    pub fn new(base: impl Into<PathBuf>, flags: MapFlags) -> Self {
        Self {
            base: base.into(),
            flags,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn file_dir(&self, file_id: FileId) -> PathBuf {
        self.base.join(file_id.value().to_string())
    }

    pub fn map_path(&self, file_id: FileId, kind: MapKind) -> PathBuf {
        self.file_dir(file_id).join(kind.short_name())
    }

    pub fn open_symbols(&self, file_id: FileId) -> MapResult<SymbolMap> {
        FileMap::load(&self.map_path(file_id, MapKind::Symbols), self.flags)
    }

    pub fn open_names(&self, file_id: FileId) -> MapResult<NameMap> {
        FileMap::load(&self.map_path(file_id, MapKind::SymbolNames), self.flags)
    }

    pub fn open_targets(&self, file_id: FileId) -> MapResult<UsrMap> {
        FileMap::load(&self.map_path(file_id, MapKind::Targets), self.flags)
    }

    pub fn open_usrs(&self, file_id: FileId) -> MapResult<UsrMap> {
        FileMap::load(&self.map_path(file_id, MapKind::Usrs), self.flags)
    }

    /// Whether any map file exists for `file_id`.
    pub fn has_maps(&self, file_id: FileId) -> bool {
        MapKind::ALL
            .iter()
            .any(|&kind| self.map_path(file_id, kind).exists())
    }

    /// Delete the per-file map directory. Missing directories are fine.
    pub fn remove_file_maps(&self, file_id: FileId) -> std::io::Result<()> {
        match std::fs::remove_dir_all(self.file_dir(file_id)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    // Writer side, used by indexer backends after a parse.

    pub fn write_symbols(
        &self,
        file_id: FileId,
        entries: &BTreeMap<Location, Symbol>,
    ) -> MapResult<()> {
        write_map(&self.map_path(file_id, MapKind::Symbols), entries)
    }

    pub fn write_names(
        &self,
        file_id: FileId,
        entries: &BTreeMap<String, BTreeSet<Location>>,
    ) -> MapResult<()> {
        write_map(&self.map_path(file_id, MapKind::SymbolNames), entries)
    }

    pub fn write_targets(
        &self,
        file_id: FileId,
        entries: &BTreeMap<String, BTreeSet<Location>>,
    ) -> MapResult<()> {
        write_map(&self.map_path(file_id, MapKind::Targets), entries)
    }

    pub fn write_usrs(
        &self,
        file_id: FileId,
        entries: &BTreeMap<String, BTreeSet<Location>>,
    ) -> MapResult<()> {
        write_map(&self.map_path(file_id, MapKind::Usrs), entries)
    }
}
