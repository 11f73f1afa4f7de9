//! Directory watch bookkeeping and the filesystem watcher boundary.
//!
//! A directory is registered with the backing watcher once, no matter how
//! many concerns (source files, dependency headers, the compilation
//! database) watch it; the bitset tracks who still cares.

use crate::error::WatchError;
use bitflags::bitflags;
use notify::{EventKind, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

bitflags! {
    /// Why a directory is being watched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WatchMode: u8 {
        const FILE_MANAGER         = 1 << 0;
        const SOURCE_FILE          = 1 << 1;
        const DEPENDENCY           = 1 << 2;
        const COMPILATION_DATABASE = 1 << 3;
    }
}

/// A filesystem event, already flattened to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Added(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

/// Boundary to the OS watcher so tests can substitute a mock.
pub trait FileSystemWatcher: Send {
    fn watch(&mut self, dir: &Path) -> Result<(), WatchError>;
    fn unwatch(&mut self, dir: &Path) -> Result<(), WatchError>;
}

/// Directory → watch-mode bitset, plus the backing watcher.
pub struct WatchTable {
    watched: HashMap<PathBuf, WatchMode>,
    watcher: Box<dyn FileSystemWatcher>,
}

impl WatchTable {
    pub fn new(watcher: Box<dyn FileSystemWatcher>) -> Self {
        Self {
            watched: HashMap::new(),
            watcher,
        }
    }

    /// OR `mode` into the directory's bitset, registering the watcher on
    /// first sight. Registration failure is a warning; the entry is kept so
    /// the bookkeeping still balances.
    pub fn watch(&mut self, dir: &Path, mode: WatchMode) {
        let entry = self.watched.entry(dir.to_path_buf()).or_default();
        let fresh = entry.is_empty();
        *entry |= mode;
        if fresh {
            if let Err(e) = self.watcher.watch(dir) {
                tracing::warn!("{e}");
            }
        }
    }

    /// Clear `mode` from the directory's bitset; unregister and drop the
    /// entry when no bits remain.
    pub fn unwatch(&mut self, dir: &Path, mode: WatchMode) {
        let Some(entry) = self.watched.get_mut(dir) else {
            return;
        };
        *entry &= !mode;
        if entry.is_empty() {
            self.watched.remove(dir);
            if let Err(e) = self.watcher.unwatch(dir) {
                tracing::warn!("{e}");
            }
        }
    }

    /// Clear the masked bits across every entry, unregistering emptied paths.
    pub fn clear(&mut self, mask: WatchMode) {
        let dirs: Vec<PathBuf> = self.watched.keys().cloned().collect();
        for dir in dirs {
            self.unwatch(&dir, mask);
        }
    }

    pub fn mode(&self, dir: &Path) -> WatchMode {
        self.watched.get(dir).copied().unwrap_or_default()
    }

    pub fn watched_paths(&self) -> &HashMap<PathBuf, WatchMode> {
        &self.watched
    }
}

/// The production watcher: notify's recommended backend, forwarding events
/// to the driver's channel.
pub struct NotifyWatcher {
    watcher: notify::RecommendedWatcher,
}

impl NotifyWatcher {
    pub fn new(events: UnboundedSender<FsEvent>) -> Result<Self, notify::Error> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let kind = event.kind;
                    for path in event.paths {
                        let fs_event = match kind {
                            EventKind::Create(_) => FsEvent::Added(path),
                            EventKind::Modify(_) => FsEvent::Modified(path),
                            EventKind::Remove(_) => FsEvent::Removed(path),
                            _ => continue,
                        };
                        // Send fails only when the driver is gone.
                        let _ = events.send(fs_event);
                    }
                }
                Err(e) => tracing::error!("file watch error: {e}"),
            }
        })?;
        Ok(Self { watcher })
    }
}

impl FileSystemWatcher for NotifyWatcher {
    fn watch(&mut self, dir: &Path) -> Result<(), WatchError> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Register {
                dir: dir.to_path_buf(),
                source,
            })
    }

    fn unwatch(&mut self, dir: &Path) -> Result<(), WatchError> {
        self.watcher
            .unwatch(dir)
            .map_err(|source| WatchError::Unregister {
                dir: dir.to_path_buf(),
                source,
            })
    }
}
