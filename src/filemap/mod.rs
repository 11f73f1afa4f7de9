//! Memory-mapped sorted key/value tables, one file per (file id, map kind).
//!
//! A map file is written once by an indexer job and then only read. Readers
//! mmap the file and binary-search an offset table; values are decoded on
//! access, so opening a map costs one `mmap` regardless of its size. The
//! query scope bounds how many maps stay open at a time.
//!
//! Layout:
//!
//! ```text
//! [magic u32][version u32][count u32][reserved u32]      header, 16 bytes
//! [key_off u32][key_len u32][val_off u32][val_len u32]   per entry, 16 bytes
//! ...
//! [key bytes | value bytes ...]                          data region
//! ```
//!
//! Offsets are relative to the start of the data region. Keys are stored in
//! an order-preserving encoding ([`MapKey`]) so entries can be compared as
//! raw byte slices; values are bincode.

mod store;

pub use store::{FileMapStore, MapKind, NameMap, SymbolMap, UsrMap};

use crate::error::{MapError, MapResult};
use crate::types::Location;
use bitflags::bitflags;
use memmap2::{Mmap, MmapOptions};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

const MAGIC: u32 = 0x5846_4452; // "RDFX"
const VERSION: u32 = 1;
const HEADER_LEN: usize = 16;
const ENTRY_LEN: usize = 16;

bitflags! {
    /// Options applied when opening a map.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MapFlags: u8 {
        /// Prefault the mapping so first queries don't page.
        const PRELOAD = 1 << 0;
    }
}

/// Keys encode to bytes whose lexicographic order matches the key's `Ord`.
pub trait MapKey: Ord + Sized {
    fn encode(&self, buf: &mut Vec<u8>);
    fn decode(bytes: &[u8]) -> Option<Self>;
}

impl MapKey for Location {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.file_id.value().to_be_bytes());
        buf.extend_from_slice(&self.line.to_be_bytes());
        buf.extend_from_slice(&self.column.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 12 {
            return None;
        }
        let file = u32::from_be_bytes(bytes[0..4].try_into().ok()?);
        Some(Location {
            file_id: crate::types::FileId::new(file)?,
            line: u32::from_be_bytes(bytes[4..8].try_into().ok()?),
            column: u32::from_be_bytes(bytes[8..12].try_into().ok()?),
        })
    }
}

impl MapKey for String {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        std::str::from_utf8(bytes).ok().map(str::to_owned)
    }
}

/// Read-only view over one on-disk map.
#[derive(Debug)]
pub struct FileMap<K, V> {
    path: PathBuf,
    mmap: Mmap,
    count: usize,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: MapKey, V: DeserializeOwned> FileMap<K, V> {
    /// Open and validate a map file.
    pub fn load(path: &Path, flags: MapFlags) -> MapResult<Self> {
        let file = File::open(path).map_err(|source| MapError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut options = MmapOptions::new();
        #[cfg(unix)]
        if flags.contains(MapFlags::PRELOAD) {
            options.populate();
        }
        #[cfg(not(unix))]
        let _ = flags;
        let mmap = unsafe { options.map(&file) }.map_err(|source| MapError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        if mmap.len() < HEADER_LEN {
            return Err(MapError::corrupt(path, "file shorter than header"));
        }
        let magic = read_u32(&mmap, 0);
        if magic != MAGIC {
            return Err(MapError::corrupt(path, format!("bad magic {magic:#010x}")));
        }
        let version = read_u32(&mmap, 4);
        if version != VERSION {
            return Err(MapError::corrupt(
                path,
                format!("unsupported version {version}"),
            ));
        }
        let count = read_u32(&mmap, 8) as usize;
        let table_end = HEADER_LEN + count.saturating_mul(ENTRY_LEN);
        if table_end > mmap.len() {
            return Err(MapError::corrupt(path, "entry table exceeds file"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            count,
            _marker: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn entry_bytes(&self, index: usize) -> MapResult<(&[u8], &[u8])> {
        let base = HEADER_LEN + index * ENTRY_LEN;
        let data_start = HEADER_LEN + self.count * ENTRY_LEN;
        let key_off = read_u32(&self.mmap, base) as usize;
        let key_len = read_u32(&self.mmap, base + 4) as usize;
        let val_off = read_u32(&self.mmap, base + 8) as usize;
        let val_len = read_u32(&self.mmap, base + 12) as usize;

        let key_start = data_start + key_off;
        let val_start = data_start + val_off;
        if key_start + key_len > self.mmap.len() || val_start + val_len > self.mmap.len() {
            return Err(MapError::corrupt(&self.path, "entry offsets exceed file"));
        }
        Ok((
            &self.mmap[key_start..key_start + key_len],
            &self.mmap[val_start..val_start + val_len],
        ))
    }

    pub fn key_at(&self, index: usize) -> MapResult<K> {
        let (key, _) = self.entry_bytes(index)?;
        K::decode(key).ok_or_else(|| MapError::corrupt(&self.path, "undecodable key"))
    }

    pub fn value_at(&self, index: usize) -> MapResult<V> {
        let (_, value) = self.entry_bytes(index)?;
        bincode::deserialize(value).map_err(|source| MapError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    /// Index of the exact key, if present.
    pub fn find(&self, key: &K) -> MapResult<Option<usize>> {
        let mut probe = Vec::new();
        key.encode(&mut probe);
        self.search(&probe).map(|r| r.ok())
    }

    /// Exact lookup.
    pub fn get(&self, key: &K) -> MapResult<Option<V>> {
        match self.find(key)? {
            Some(index) => Ok(Some(self.value_at(index)?)),
            None => Ok(None),
        }
    }

    /// Index of the greatest key ≤ `key`, if any.
    pub fn lower_bound(&self, key: &K) -> MapResult<Option<usize>> {
        let mut probe = Vec::new();
        key.encode(&mut probe);
        match self.search(&probe)? {
            Ok(index) => Ok(Some(index)),
            Err(0) => Ok(None),
            Err(insertion) => Ok(Some(insertion - 1)),
        }
    }

    /// Binary search over encoded keys. `Ok(i)` on an exact hit, `Err(i)` with
    /// the insertion point otherwise, mirroring `slice::binary_search`.
    fn search(&self, probe: &[u8]) -> MapResult<Result<usize, usize>> {
        let mut lo = 0usize;
        let mut hi = self.count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (key, _) = self.entry_bytes(mid)?;
            match key.cmp(probe) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Ok(Ok(mid)),
            }
        }
        Ok(Err(lo))
    }

    /// In-order iteration over decoded entries.
    pub fn iter(&self) -> impl Iterator<Item = MapResult<(K, V)>> + '_ {
        (0..self.count).map(move |i| Ok((self.key_at(i)?, self.value_at(i)?)))
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("bounds checked"))
}

/// Write a map file atomically (temp file + rename).
///
/// `BTreeMap` iteration order and [`MapKey`] byte order agree, so entries
/// land pre-sorted for the reader's binary search.
pub fn write_map<K: MapKey, V: Serialize>(
    path: &Path,
    entries: &BTreeMap<K, V>,
) -> MapResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| MapError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let mut table = Vec::with_capacity(entries.len() * ENTRY_LEN);
    let mut data = Vec::new();
    for (key, value) in entries {
        let key_off = data.len() as u32;
        key.encode(&mut data);
        let key_len = data.len() as u32 - key_off;

        let val_off = data.len() as u32;
        bincode::serialize_into(&mut data, value).map_err(|source| MapError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        let val_len = data.len() as u32 - val_off;

        table.extend_from_slice(&key_off.to_le_bytes());
        table.extend_from_slice(&key_len.to_le_bytes());
        table.extend_from_slice(&val_off.to_le_bytes());
        table.extend_from_slice(&val_len.to_le_bytes());
    }

    let mut out = Vec::with_capacity(HEADER_LEN + table.len() + data.len());
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&table);
    out.extend_from_slice(&data);

    let temp = path.with_extension("tmp");
    std::fs::write(&temp, &out).map_err(|source| MapError::Write {
        path: temp.clone(),
        source,
    })?;
    std::fs::rename(&temp, path).map_err(|source| MapError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
