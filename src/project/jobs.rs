//! Indexer jobs and the shared visited-files table.
//!
//! Workers and the main loop meet in exactly two places: the mutex-guarded
//! [`VisitedFiles`] table (claim and release of file ids) and the results
//! channel delivering one terminal [`JobOutcome`] per job. Everything else
//! belongs to the main loop.

use crate::filemap::FileMapStore;
use crate::paths::PathRegistry;
use crate::symbol::{Diagnostic, FixIt};
use crate::types::{FileId, SourceKey};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use super::source::Source;

/// Monotonic per-project job number; tells a superseded job's result from
/// its replacement's.
pub type JobId = u64;

/// Why a job was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexReason {
    Startup,
    Dirty,
    Reindex,
    CompilationDatabase,
}

/// A unit of work handed to the indexer backend.
#[derive(Debug, Clone)]
pub struct IndexerJob {
    pub source: Source,
    pub reason: IndexReason,
}

impl IndexerJob {
    pub fn new(source: Source, reason: IndexReason) -> Self {
        Self { source, reason }
    }

    pub fn source_key(&self) -> SourceKey {
        self.source.key()
    }
}

/// Registry entry for a running job.
#[derive(Debug)]
pub(crate) struct ActiveJob {
    pub(crate) job_id: JobId,
    pub(crate) job: IndexerJob,
    pub(crate) cancel: Arc<AtomicBool>,
}

/// What an indexer job produced. The per-file symbol maps are already on
/// disk by the time this is delivered; the result carries the metadata to
/// merge into project state.
#[derive(Debug, Clone)]
pub struct IndexResult {
    pub source_key: SourceKey,
    pub file_id: FileId,
    pub visited: HashSet<FileId>,
    /// Includer → the exact include set the parse observed.
    pub dependencies: HashMap<FileId, BTreeSet<FileId>>,
    pub fix_its: HashMap<FileId, Vec<FixIt>>,
    pub diagnostics: HashMap<FileId, Vec<Diagnostic>>,
}

impl IndexResult {
    pub fn new(source_key: SourceKey, file_id: FileId) -> Self {
        Self {
            source_key,
            file_id,
            visited: HashSet::new(),
            dependencies: HashMap::new(),
            fix_its: HashMap::new(),
            diagnostics: HashMap::new(),
        }
    }
}

/// Terminal message of a job. `result` is `None` when the job aborted.
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub source_key: SourceKey,
    pub result: Option<IndexResult>,
}

/// Everything a backend worker needs to run one job.
pub struct JobContext {
    pub job_id: JobId,
    pub source: Source,
    pub reason: IndexReason,
    pub cancel: Arc<AtomicBool>,
    pub visited: Arc<VisitedFiles>,
    pub registry: Arc<PathRegistry>,
    pub store: FileMapStore,
    pub results: tokio::sync::mpsc::UnboundedSender<JobOutcome>,
}

/// The compiler front-end that parses one translation unit.
///
/// `run` must not block the caller; it spawns its work and eventually sends
/// exactly one [`JobOutcome`] on `ctx.results`, even when cancelled.
pub trait IndexerBackend: Send + Sync {
    fn run(&self, ctx: JobContext);
}

#[derive(Debug, Default)]
struct VisitedInner {
    files: HashMap<FileId, PathBuf>,
    active: HashMap<SourceKey, JobId>,
    job_visited: HashMap<JobId, HashSet<FileId>>,
}

/// Files claimed by in-flight (or completed) indexer jobs.
///
/// A claim means "this file's maps are being written or are current"; a
/// worker that fails to claim a header skips re-walking it. Claims outlive
/// their job until the file goes dirty or the job aborts.
#[derive(Debug, Default)]
pub struct VisitedFiles {
    inner: Mutex<VisitedInner>,
}

impl VisitedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim first-visit rights on `file_id` for the job currently active
    /// under `source_key`. False when the file is already claimed or no job
    /// is active for the key.
    pub fn visit(&self, file_id: FileId, path: impl Into<PathBuf>, source_key: SourceKey) -> bool {
        let mut inner = self.inner.lock();
        if inner.files.contains_key(&file_id) {
            return false;
        }
        let Some(&job_id) = inner.active.get(&source_key) else {
            return false;
        };
        inner.files.insert(file_id, path.into());
        inner.job_visited.entry(job_id).or_default().insert(file_id);
        true
    }

    /// Drop claims, typically after an abort or before re-indexing.
    pub fn release(&self, ids: impl IntoIterator<Item = FileId>) {
        let mut inner = self.inner.lock();
        for id in ids {
            inner.files.remove(&id);
        }
    }

    pub fn contains(&self, file_id: FileId) -> bool {
        self.inner.lock().files.contains_key(&file_id)
    }

    pub fn path(&self, file_id: FileId) -> Option<PathBuf> {
        self.inner.lock().files.get(&file_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot for persistence and reporting.
    pub fn snapshot(&self) -> Vec<(FileId, PathBuf)> {
        let inner = self.inner.lock();
        let mut entries: Vec<_> = inner
            .files
            .iter()
            .map(|(&id, path)| (id, path.clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    /// Restore persisted claims at startup.
    pub(crate) fn seed(&self, entries: impl IntoIterator<Item = (FileId, PathBuf)>) {
        let mut inner = self.inner.lock();
        for (id, path) in entries {
            inner.files.insert(id, path);
        }
    }

    /// Make `job_id` the job that `visit` attributes claims to for this key.
    pub(crate) fn register_job(&self, source_key: SourceKey, job_id: JobId) {
        self.inner.lock().active.insert(source_key, job_id);
    }

    /// Retire a job: drop the active entry when it still points at `job_id`
    /// and hand back the ids the job claimed.
    pub(crate) fn retire_job(&self, source_key: SourceKey, job_id: JobId) -> HashSet<FileId> {
        let mut inner = self.inner.lock();
        if inner.active.get(&source_key) == Some(&job_id) {
            inner.active.remove(&source_key);
        }
        inner.job_visited.remove(&job_id).unwrap_or_default()
    }

    /// Rough live size in bytes, for memory reporting.
    pub fn estimated_bytes(&self) -> usize {
        use std::mem::size_of;
        let inner = self.inner.lock();
        inner
            .files
            .values()
            .map(|p| size_of::<(FileId, PathBuf)>() + p.as_os_str().len())
            .sum()
    }
}
