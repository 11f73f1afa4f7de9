//! Scoped cache of open file maps with LRU eviction.
//!
//! Maps are memory mappings; keeping every indexed file's maps resident would
//! exhaust address space on a large tree. A scope lives for one query, caches
//! what the query touches, and evicts the least-recently-used mapping once
//! the budget is hit. Locality within a multi-step query (find-callers walks
//! many files but revisits some) is what the cache buys.

use crate::filemap::{FileMapStore, MapKind, NameMap, SymbolMap, UsrMap};
use crate::types::FileId;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// Per-query file-map cache. Not thread-safe; a scope belongs to the one
/// query handler that opened it.
pub struct QueryScope<'a> {
    store: &'a FileMapStore,
    max: usize,
    symbols: HashMap<FileId, Arc<SymbolMap>>,
    names: HashMap<FileId, Arc<NameMap>>,
    targets: HashMap<FileId, Arc<UsrMap>>,
    usrs: HashMap<FileId, Arc<UsrMap>>,
    /// Front is least recently used.
    lru: VecDeque<(MapKind, FileId)>,
    /// Total successful opens over the scope's lifetime, evictions included.
    total_opened: usize,
    /// Files whose maps failed to open; drained into the dirty set by the
    /// project when the query ends.
    failed: BTreeSet<FileId>,
}

impl<'a> QueryScope<'a> {
    pub fn new(store: &'a FileMapStore, max: usize) -> Self {
        debug_assert!(max > 0, "scope budget must be positive");
        Self {
            store,
            max,
            symbols: HashMap::new(),
            names: HashMap::new(),
            targets: HashMap::new(),
            usrs: HashMap::new(),
            lru: VecDeque::new(),
            total_opened: 0,
            failed: BTreeSet::new(),
        }
    }

    pub fn open_symbols(&mut self, file_id: FileId) -> Option<Arc<SymbolMap>> {
        if let Some(map) = self.symbols.get(&file_id).cloned() {
            self.touch(MapKind::Symbols, file_id);
            return Some(map);
        }
        match self.store.open_symbols(file_id) {
            Ok(map) => {
                let map = Arc::new(map);
                self.symbols.insert(file_id, Arc::clone(&map));
                self.admit(MapKind::Symbols, file_id);
                Some(map)
            }
            Err(err) => self.record_failure(file_id, err),
        }
    }

    pub fn open_names(&mut self, file_id: FileId) -> Option<Arc<NameMap>> {
        if let Some(map) = self.names.get(&file_id).cloned() {
            self.touch(MapKind::SymbolNames, file_id);
            return Some(map);
        }
        match self.store.open_names(file_id) {
            Ok(map) => {
                let map = Arc::new(map);
                self.names.insert(file_id, Arc::clone(&map));
                self.admit(MapKind::SymbolNames, file_id);
                Some(map)
            }
            Err(err) => self.record_failure(file_id, err),
        }
    }

    pub fn open_targets(&mut self, file_id: FileId) -> Option<Arc<UsrMap>> {
        if let Some(map) = self.targets.get(&file_id).cloned() {
            self.touch(MapKind::Targets, file_id);
            return Some(map);
        }
        match self.store.open_targets(file_id) {
            Ok(map) => {
                let map = Arc::new(map);
                self.targets.insert(file_id, Arc::clone(&map));
                self.admit(MapKind::Targets, file_id);
                Some(map)
            }
            Err(err) => self.record_failure(file_id, err),
        }
    }

    pub fn open_usrs(&mut self, file_id: FileId) -> Option<Arc<UsrMap>> {
        if let Some(map) = self.usrs.get(&file_id).cloned() {
            self.touch(MapKind::Usrs, file_id);
            return Some(map);
        }
        match self.store.open_usrs(file_id) {
            Ok(map) => {
                let map = Arc::new(map);
                self.usrs.insert(file_id, Arc::clone(&map));
                self.admit(MapKind::Usrs, file_id);
                Some(map)
            }
            Err(err) => self.record_failure(file_id, err),
        }
    }

    /// Open maps currently cached.
    pub fn open_count(&self) -> usize {
        self.lru.len()
    }

    /// Successful opens over the scope's lifetime.
    pub fn total_opened(&self) -> usize {
        self.total_opened
    }

    pub fn is_cached(&self, kind: MapKind, file_id: FileId) -> bool {
        match kind {
            MapKind::Symbols => self.symbols.contains_key(&file_id),
            MapKind::SymbolNames => self.names.contains_key(&file_id),
            MapKind::Targets => self.targets.contains_key(&file_id),
            MapKind::Usrs => self.usrs.contains_key(&file_id),
        }
    }

    pub fn failed_files(&self) -> &BTreeSet<FileId> {
        &self.failed
    }

    /// Hand the failed set to the caller, leaving the scope reusable.
    pub fn take_failed(&mut self) -> BTreeSet<FileId> {
        std::mem::take(&mut self.failed)
    }

    /// The LRU list and the kind maps must always hold exactly the same
    /// entries, within budget.
    pub fn validate(&self) -> bool {
        let cached = self.symbols.len() + self.names.len() + self.targets.len() + self.usrs.len();
        self.lru.len() <= self.max
            && self.lru.len() == cached
            && self.lru.iter().all(|&(kind, file)| self.is_cached(kind, file))
    }

    fn touch(&mut self, kind: MapKind, file_id: FileId) {
        if let Some(pos) = self.lru.iter().position(|&e| e == (kind, file_id)) {
            let entry = self.lru.remove(pos).expect("position just found");
            self.lru.push_back(entry);
        }
    }

    fn admit(&mut self, kind: MapKind, file_id: FileId) {
        self.lru.push_back((kind, file_id));
        self.total_opened += 1;
        if self.lru.len() > self.max {
            let (old_kind, old_file) = self.lru.pop_front().expect("over budget");
            self.evict(old_kind, old_file);
        }
    }

    fn evict(&mut self, kind: MapKind, file_id: FileId) {
        // Dropping the Arc here; callers still holding one keep the mapping
        // alive until they let go.
        match kind {
            MapKind::Symbols => {
                self.symbols.remove(&file_id);
            }
            MapKind::SymbolNames => {
                self.names.remove(&file_id);
            }
            MapKind::Targets => {
                self.targets.remove(&file_id);
            }
            MapKind::Usrs => {
                self.usrs.remove(&file_id);
            }
        }
    }

    fn record_failure<T>(&mut self, file_id: FileId, err: crate::error::MapError) -> Option<T> {
        tracing::debug!("map open failed for file {file_id}: {err}");
        self.failed.insert(file_id);
        None
    }
}
