//! Path registry: the process-wide id allocator for filesystem paths.
//!
//! Every path the engine touches is interned once and addressed by its
//! [`FileId`] from then on. The registry is shared between the main loop and
//! indexer workers, so lookups and allocation go through a lock.

use crate::types::FileId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
struct RegistryInner {
    by_path: HashMap<PathBuf, FileId>,
    by_id: HashMap<FileId, PathBuf>,
    next_id: u32,
}

/// Bidirectional path ⇄ id table.
///
/// Ids are dense, start at 1 (zero is the invalid sentinel) and stay stable
/// for the life of the process. Persisted project state re-seeds the table on
/// load so ids survive restarts.
#[derive(Debug)]
pub struct PathRegistry {
    inner: RwLock<RegistryInner>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                by_path: HashMap::new(),
                by_id: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Intern `path`, allocating a fresh id on first sight.
    pub fn insert_file(&self, path: impl Into<PathBuf>) -> FileId {
        let path = path.into();
        let mut inner = self.inner.write();
        if let Some(&id) = inner.by_path.get(&path) {
            return id;
        }
        let id = FileId::new(inner.next_id).expect("file id space exhausted");
        inner.next_id += 1;
        inner.by_path.insert(path.clone(), id);
        inner.by_id.insert(id, path);
        id
    }

    /// Id for an already-interned path.
    pub fn file_id(&self, path: &Path) -> Option<FileId> {
        self.inner.read().by_path.get(path).copied()
    }

    /// Path for an id.
    pub fn path(&self, id: FileId) -> Option<PathBuf> {
        self.inner.read().by_id.get(&id).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.read().by_path.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Restore persisted (id, path) pairs. Later allocations continue past
    /// the largest seeded id.
    pub fn seed(&self, entries: impl IntoIterator<Item = (FileId, PathBuf)>) {
        let mut inner = self.inner.write();
        for (id, path) in entries {
            inner.next_id = inner.next_id.max(id.value() + 1);
            inner.by_path.insert(path.clone(), id);
            inner.by_id.insert(id, path);
        }
    }

    /// Current (id, path) table, for persistence.
    pub fn snapshot(&self) -> Vec<(FileId, PathBuf)> {
        let inner = self.inner.read();
        let mut entries: Vec<_> = inner.by_id.iter().map(|(&id, p)| (id, p.clone())).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}

impl Default for PathRegistry {
    fn default() -> Self {
        Self::new()
    }
}
