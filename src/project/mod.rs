//! The per-project core: owns the indexed state for one source tree,
//! coordinates incremental re-indexing, and serves queries.
//!
//! All mutation happens on the main loop (see [`ProjectDriver`]); indexer
//! backends run elsewhere and talk back through [`VisitedFiles`] and the
//! results channel.

mod dirty;
mod driver;
mod jobs;
mod persistence;
mod queries;
mod source;
mod watch;

pub use dirty::DirtySet;
pub use driver::ProjectDriver;
pub use jobs::{
    IndexReason, IndexResult, IndexerBackend, IndexerJob, JobContext, JobId, JobOutcome,
    VisitedFiles,
};
pub use persistence::{ProjectFile, ProjectPersistence, SourcesFile, read_sources};
pub use source::{
    CompilationDatabaseInfo, CompileCommand, Source, SourceList, load_compile_commands, mtime_of,
    path_matches,
};
pub use watch::{FileSystemWatcher, FsEvent, NotifyWatcher, WatchMode, WatchTable};

use crate::config::Settings;
use crate::error::ProjectResult;
use crate::filemap::{FileMapStore, MapFlags};
use crate::graph::{DependencyGraph, DependencyMode};
use crate::paths::PathRegistry;
use crate::symbol::{Diagnostic, FixIt};
use crate::types::{FileId, SourceKey};
use jobs::ActiveJob;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

/// Approximate live sizes of the project's in-memory tables, in bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryEstimate {
    pub sources: usize,
    pub dependencies: usize,
    pub visited: usize,
    pub fix_its: usize,
    pub diagnostics: usize,
}

impl MemoryEstimate {
    pub fn total(&self) -> usize {
        self.sources + self.dependencies + self.visited + self.fix_its + self.diagnostics
    }
}

pub struct Project {
    root: PathBuf,
    settings: Arc<Settings>,
    registry: Arc<PathRegistry>,
    store: FileMapStore,
    persistence: ProjectPersistence,

    sources: HashMap<FileId, SourceList>,
    compilation_database: Option<CompilationDatabaseInfo>,
    dependencies: DependencyGraph,
    visited: Arc<VisitedFiles>,
    fix_its: HashMap<FileId, Vec<FixIt>>,
    diagnostics: HashMap<FileId, Vec<Diagnostic>>,
    suspended: HashSet<FileId>,

    active_jobs: HashMap<SourceKey, ActiveJob>,
    next_job_id: JobId,
    dirty: DirtySet,
    watch: WatchTable,

    backend: Arc<dyn IndexerBackend>,
    results: UnboundedSender<JobOutcome>,
    save_pending: bool,
    reindex_waiters: Vec<(oneshot::Sender<usize>, usize)>,
}

impl Project {
    pub fn new(
        root: impl Into<PathBuf>,
        settings: Arc<Settings>,
        registry: Arc<PathRegistry>,
        backend: Arc<dyn IndexerBackend>,
        watcher: Box<dyn FileSystemWatcher>,
        results: UnboundedSender<JobOutcome>,
    ) -> Self {
        let root = root.into();
        let data_dir = if settings.data_dir.is_absolute() {
            settings.data_dir.clone()
        } else {
            root.join(&settings.data_dir)
        };
        let map_flags = if settings.query.preload_maps {
            MapFlags::PRELOAD
        } else {
            MapFlags::empty()
        };
        let debounce = Duration::from_millis(settings.indexing.debounce_ms);

        Self {
            root,
            store: FileMapStore::new(data_dir.join("maps"), map_flags),
            persistence: ProjectPersistence::new(&data_dir),
            settings,
            registry,
            sources: HashMap::new(),
            compilation_database: None,
            dependencies: DependencyGraph::new(),
            visited: Arc::new(VisitedFiles::new()),
            fix_its: HashMap::new(),
            diagnostics: HashMap::new(),
            suspended: HashSet::new(),
            active_jobs: HashMap::new(),
            next_job_id: 1,
            dirty: DirtySet::new(debounce),
            watch: WatchTable::new(watcher),
            backend,
            results,
            save_pending: false,
            reindex_waiters: Vec::new(),
        }
    }

    /// Load persisted state, prime watchers, and mark stale sources dirty.
    pub fn init(&mut self) -> ProjectResult<()> {
        if self.persistence.exists() {
            self.restore();
        }

        if let Some(db) = &self.compilation_database {
            let dir = db.dir.clone();
            self.watch.watch(&dir, WatchMode::COMPILATION_DATABASE);
        }

        let mut stale = Vec::new();
        let mut gone = Vec::new();
        for list in self.sources.values() {
            for source in list {
                if !source.path.exists() {
                    gone.push(source.file_id);
                } else if source.is_stale() {
                    stale.push(source.file_id);
                }
                if let Some(parent) = source.path.parent() {
                    self.watch.watch(parent, WatchMode::SOURCE_FILE);
                }
            }
        }
        for file_id in self.dependency_files() {
            if let Some(path) = self.registry.path(file_id) {
                if let Some(parent) = path.parent() {
                    self.watch.watch(parent, WatchMode::DEPENDENCY);
                }
            }
        }

        for file_id in gone {
            tracing::info!("source for file {file_id} disappeared, removing");
            self.remove_source(file_id);
        }
        for file_id in stale {
            tracing::debug!("file {file_id} changed while we were away, marking dirty");
            self.mark_dirty(file_id);
        }

        tracing::info!(
            "project at {} initialized: {} sources, {} dependency nodes",
            self.root.display(),
            self.source_count(),
            self.dependencies.len()
        );
        Ok(())
    }

    fn restore(&mut self) {
        let sources = match self.persistence.load_sources() {
            Ok(file) => {
                self.compilation_database = file.compilation_database;
                file.sources
            }
            Err(e) => {
                tracing::warn!("discarding persisted sources: {e}");
                return;
            }
        };

        match self.persistence.load_project() {
            Ok(file) => {
                self.registry.seed(file.paths);
                self.dependencies = DependencyGraph::from_edges(file.dependencies);
                self.visited.seed(file.visited);
                for file_id in file.dirty {
                    self.dirty.mark(file_id);
                }
            }
            Err(e) => {
                // Sources survive; everything derived gets rebuilt.
                tracing::warn!("discarding persisted project state: {e}");
            }
        }

        for mut source in sources {
            source.file_id = self.registry.insert_file(&source.path);
            self.sources.entry(source.file_id).or_default().push(source);
        }
    }

    /// Cancel outstanding jobs and save. Called when the project is torn
    /// down; in-flight results are discarded on the next run.
    pub fn shutdown(&mut self) {
        for (key, active) in self.active_jobs.drain() {
            active.cancel.store(true, Ordering::Relaxed);
            let claims = self.visited.retire_job(key, active.job_id);
            self.visited.release(claims);
        }
        if let Err(e) = self.save_now() {
            tracing::warn!("failed to save project state on shutdown: {e}");
        }
    }

    // Accessors.

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &Arc<PathRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &FileMapStore {
        &self.store
    }

    pub fn dependencies_graph(&self) -> &DependencyGraph {
        &self.dependencies
    }

    pub fn visited_files(&self) -> &VisitedFiles {
        &self.visited
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values().flatten()
    }

    pub fn source_count(&self) -> usize {
        self.sources.values().map(Vec::len).sum()
    }

    pub fn has_source(&self, file_id: FileId) -> bool {
        self.sources.contains_key(&file_id)
    }

    pub fn compilation_database(&self) -> Option<&CompilationDatabaseInfo> {
        self.compilation_database.as_ref()
    }

    pub fn active_job_count(&self) -> usize {
        self.active_jobs.len()
    }

    /// Sources currently being indexed.
    pub fn active_sources(&self) -> Vec<&Source> {
        self.active_jobs.values().map(|a| &a.job.source).collect()
    }

    /// Transitive closure over the include graph.
    pub fn dependencies(&self, file_id: FileId, mode: DependencyMode) -> BTreeSet<FileId> {
        self.dependencies.dependencies(file_id, mode)
    }

    pub fn depends_on(&self, source: FileId, header: FileId) -> bool {
        self.dependencies.depends_on(source, header)
    }

    /// Files in the graph that are not sources, i.e. headers.
    fn dependency_files(&self) -> Vec<FileId> {
        self.dependencies
            .files()
            .filter(|f| !self.sources.contains_key(f))
            .collect()
    }

    // Job lifecycle.

    /// Register the job's source and start the backend. An active job with
    /// the same source key is superseded: cancelled, its eventual result
    /// discarded.
    pub fn index(&mut self, job: IndexerJob) {
        let key = job.source_key();
        let file_id = job.source.file_id;

        let list = self.sources.entry(file_id).or_default();
        if let Some(existing) = list.iter_mut().find(|s| s.key() == key) {
            *existing = job.source.clone();
        } else {
            list.push(job.source.clone());
        }
        if let Some(parent) = job.source.path.parent() {
            let parent = parent.to_path_buf();
            self.watch.watch(&parent, WatchMode::SOURCE_FILE);
        }

        let job_id = self.next_job_id;
        self.next_job_id += 1;
        let cancel = Arc::new(AtomicBool::new(false));

        if let Some(old) = self.active_jobs.insert(
            key,
            ActiveJob {
                job_id,
                job: job.clone(),
                cancel: Arc::clone(&cancel),
            },
        ) {
            tracing::debug!("job {} for key {key} superseded by job {job_id}", old.job_id);
            old.cancel.store(true, Ordering::Relaxed);
        }
        self.visited.register_job(key, job_id);

        let ctx = JobContext {
            job_id,
            source: job.source,
            reason: job.reason,
            cancel,
            visited: Arc::clone(&self.visited),
            registry: Arc::clone(&self.registry),
            store: self.store.clone(),
            results: self.results.clone(),
        };
        self.backend.run(ctx);
    }

    /// Apply a finished job's result, or discard it when the job was
    /// superseded or aborted. Runs on the main loop.
    pub fn on_job_finished(&mut self, outcome: JobOutcome) {
        let key = outcome.source_key;
        let is_current = self
            .active_jobs
            .get(&key)
            .is_some_and(|a| a.job_id == outcome.job_id);

        if !is_current {
            // Superseded (or its source was removed): nothing it learned is
            // trustworthy anymore. Free its claims so the replacement can
            // re-walk them.
            let mut ids = self.visited.retire_job(key, outcome.job_id);
            if let Some(result) = &outcome.result {
                ids.extend(result.visited.iter().copied());
            }
            self.visited.release(ids);
            tracing::debug!("discarding result of job {} for key {key}", outcome.job_id);
            return;
        }

        self.active_jobs.remove(&key);
        let claims = self.visited.retire_job(key, outcome.job_id);
        match outcome.result {
            Some(result) => self.apply_result(result),
            None => {
                tracing::debug!("job {} for key {key} aborted", outcome.job_id);
                self.visited.release(claims);
            }
        }

        if self.active_jobs.is_empty() {
            self.on_idle();
        }
    }

    fn apply_result(&mut self, result: IndexResult) {
        for &file_id in &result.visited {
            self.dependencies.insert_or_get(file_id);
        }
        for (includer, includes) in result.dependencies {
            self.dependencies.set_includes(includer, includes);
        }

        // New headers need their directories watched.
        for &file_id in &result.visited {
            if self.sources.contains_key(&file_id) {
                continue;
            }
            if let Some(path) = self.registry.path(file_id) {
                if let Some(parent) = path.parent() {
                    self.watch.watch(parent, WatchMode::DEPENDENCY);
                }
            }
        }

        if let Some(list) = self.sources.get_mut(&result.file_id) {
            if let Some(source) = list.iter_mut().find(|s| s.key() == result.source_key) {
                source.stamp();
            }
        }

        for (file_id, fix_its) in result.fix_its {
            if fix_its.is_empty() {
                self.fix_its.remove(&file_id);
            } else {
                self.fix_its.insert(file_id, fix_its);
            }
        }
        // Diff-based: files absent from the result keep their diagnostics,
        // files reported clean are cleared.
        for (file_id, diagnostics) in result.diagnostics {
            if diagnostics.is_empty() {
                self.diagnostics.remove(&file_id);
            } else {
                self.diagnostics.insert(file_id, diagnostics);
            }
        }
    }

    fn on_idle(&mut self) {
        for (waiter, count) in self.reindex_waiters.drain(..) {
            let _ = waiter.send(count);
        }
        if (self.save_pending || self.settings.indexing.save_on_idle) && !self.dirty.is_armed() {
            if let Err(e) = self.save_now() {
                tracing::warn!("failed to save project state: {e}");
            }
        }
    }

    // Dirty propagation.

    /// Note that a file changed; re-index jobs start after the debounce
    /// interval.
    pub fn mark_dirty(&mut self, file_id: FileId) {
        self.dirty.mark(file_id);
    }

    pub fn is_dirty(&self, file_id: FileId) -> bool {
        self.dirty.contains(file_id)
    }

    pub fn dirty_timer_armed(&self) -> bool {
        self.dirty.is_armed()
    }

    /// Driver tick: when the debounce interval has passed, expand the
    /// pending set over the dependency graph and start jobs. Returns the
    /// number of jobs started.
    pub fn poll_dirty(&mut self) -> usize {
        let Some(pending) = self.dirty.take_ready() else {
            return 0;
        };
        let expanded = self.expand_dirty(pending);
        self.start_dirty_jobs(expanded, IndexReason::Dirty)
    }

    /// Union of every file in `pending` with everything that transitively
    /// includes it, kept to files with a known source.
    fn expand_to_sources(&self, pending: impl IntoIterator<Item = FileId>) -> BTreeSet<FileId> {
        let mut all = BTreeSet::new();
        for file_id in pending {
            all.insert(file_id);
            all.extend(self.dependencies.dependencies(file_id, DependencyMode::DependsOnArg));
        }
        all.retain(|f| self.sources.contains_key(f));
        all
    }

    /// The automatic-path variant: suspended files are additionally
    /// excluded. Suspension only disables automatic indexing; an explicit
    /// `reindex` still runs.
    fn expand_dirty(&self, pending: impl IntoIterator<Item = FileId>) -> BTreeSet<FileId> {
        let mut all = self.expand_to_sources(pending);
        all.retain(|f| !self.suspended.contains(f));
        all
    }

    /// Start one job per source of every file in the set. Claims on these
    /// files are released first so the new jobs re-walk them.
    pub fn start_dirty_jobs(
        &mut self,
        files: BTreeSet<FileId>,
        reason: IndexReason,
    ) -> usize {
        self.visited.release(files.iter().copied());
        let jobs: Vec<IndexerJob> = files
            .iter()
            .filter_map(|f| self.sources.get(f))
            .flatten()
            .map(|s| IndexerJob::new(s.clone(), reason))
            .collect();
        let count = jobs.len();
        for job in jobs {
            self.index(job);
        }
        count
    }

    /// Synchronous re-index of every source whose path matches `pattern`
    /// (and its dependents). A user request, so suspended files are not
    /// filtered out. Returns the number of jobs started; `wait` is
    /// signalled with that count when the last active job completes.
    pub fn reindex(
        &mut self,
        pattern: &str,
        wait: Option<oneshot::Sender<usize>>,
    ) -> usize {
        let matched: Vec<FileId> = self.matching_sources(pattern);
        let expanded = self.expand_to_sources(matched);
        let count = self.start_dirty_jobs(expanded, IndexReason::Reindex);
        if let Some(waiter) = wait {
            if self.active_jobs.is_empty() {
                let _ = waiter.send(count);
            } else {
                self.reindex_waiters.push((waiter, count));
            }
        }
        count
    }

    /// Remove every source whose path matches `pattern`, with its on-disk
    /// maps and graph node. Returns the number of sources removed.
    pub fn remove(&mut self, pattern: &str) -> usize {
        let matched = self.matching_sources(pattern);
        matched
            .into_iter()
            .map(|file_id| self.remove_source(file_id))
            .sum()
    }

    fn matching_sources(&self, pattern: &str) -> Vec<FileId> {
        let mut matched: Vec<FileId> = self
            .sources
            .iter()
            .filter(|(_, list)| list.iter().any(|s| path_matches(pattern, &s.path)))
            .map(|(&f, _)| f)
            .collect();
        matched.sort();
        matched
    }

    /// Drop one file's sources entirely: active jobs cancelled, maps deleted
    /// from disk, graph node unlinked, bookkeeping cleared.
    pub fn remove_source(&mut self, file_id: FileId) -> usize {
        let Some(list) = self.sources.remove(&file_id) else {
            return 0;
        };
        for source in &list {
            if let Some(active) = self.active_jobs.remove(&source.key()) {
                active.cancel.store(true, Ordering::Relaxed);
                let claims = self.visited.retire_job(source.key(), active.job_id);
                self.visited.release(claims);
            }
        }
        if let Err(e) = self.store.remove_file_maps(file_id) {
            tracing::warn!("failed to delete maps for file {file_id}: {e}");
        }
        self.dependencies.remove(file_id);
        self.dirty.remove(file_id);
        self.suspended.remove(&file_id);
        self.fix_its.remove(&file_id);
        self.diagnostics.remove(&file_id);
        self.visited.release([file_id]);
        list.len()
    }

    // Filesystem events, dispatched by the driver.

    pub fn on_file_added(&mut self, path: &Path) {
        self.on_file_event(path, false);
    }

    pub fn on_file_modified(&mut self, path: &Path) {
        self.on_file_event(path, false);
    }

    pub fn on_file_removed(&mut self, path: &Path) {
        self.on_file_event(path, true);
    }

    fn on_file_event(&mut self, path: &Path, removed: bool) {
        if self.is_compilation_database(path) {
            if let Err(e) = self.reload_compilation_database() {
                tracing::warn!("failed to reload compilation database: {e}");
            }
            return;
        }
        let Some(file_id) = self.registry.file_id(path) else {
            return;
        };
        if self.sources.contains_key(&file_id) {
            if removed {
                tracing::info!("source {} removed", path.display());
                self.remove_source(file_id);
            } else {
                self.mark_dirty(file_id);
            }
        } else if self.dependencies.contains(file_id) {
            self.mark_dirty(file_id);
        }
    }

    fn is_compilation_database(&self, path: &Path) -> bool {
        self.compilation_database
            .as_ref()
            .is_some_and(|db| db.database_path() == path)
    }

    // Compilation database.

    pub fn set_compilation_database(&mut self, info: CompilationDatabaseInfo) {
        let dir = info.dir.clone();
        self.watch.watch(&dir, WatchMode::COMPILATION_DATABASE);
        self.compilation_database = Some(info);
    }

    /// Diff `compile_commands.json` against the current sources: removed
    /// entries are dropped, added or changed ones go dirty. Never a blind
    /// full re-index. Returns the number of sources added.
    pub fn reload_compilation_database(&mut self) -> ProjectResult<usize> {
        let Some(db) = self.compilation_database.clone() else {
            return Ok(0);
        };
        let commands = load_compile_commands(&db.database_path())?;

        let mut new_sources: HashMap<SourceKey, Source> = HashMap::new();
        for command in commands {
            let file_id = self.registry.insert_file(&command.file);
            let mut arguments = command.arguments.into_iter();
            let Some(compiler) = arguments.next() else {
                continue;
            };
            let source = Source::new(file_id, &command.file, compiler, arguments.collect());
            new_sources.insert(source.key(), source);
        }

        let existing: HashMap<SourceKey, FileId> = self
            .sources
            .iter()
            .flat_map(|(&f, list)| list.iter().map(move |s| (s.key(), f)))
            .collect();

        for (&key, &file_id) in &existing {
            if !new_sources.contains_key(&key) {
                self.remove_source_entry(file_id, key);
            }
        }

        let mut added = 0;
        for (key, source) in new_sources {
            if existing.contains_key(&key) {
                continue;
            }
            let file_id = source.file_id;
            if let Some(parent) = source.path.parent() {
                let parent = parent.to_path_buf();
                self.watch.watch(&parent, WatchMode::SOURCE_FILE);
            }
            self.sources.entry(file_id).or_default().push(source);
            self.mark_dirty(file_id);
            added += 1;
        }

        if let Some(db) = &mut self.compilation_database {
            db.last_modified = mtime_of(&db.database_path());
        }
        tracing::info!("compilation database reloaded: {added} sources added");
        Ok(added)
    }

    /// Remove one (file, key) source; falls back to the full per-file
    /// cleanup when it was the file's last one.
    fn remove_source_entry(&mut self, file_id: FileId, key: SourceKey) {
        if let Some(active) = self.active_jobs.remove(&key) {
            active.cancel.store(true, Ordering::Relaxed);
            let claims = self.visited.retire_job(key, active.job_id);
            self.visited.release(claims);
        }
        let now_empty = match self.sources.get_mut(&file_id) {
            Some(list) => {
                list.retain(|s| s.key() != key);
                list.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.remove_source(file_id);
        }
    }

    // Watch control.

    pub fn watch(&mut self, dir: &Path, mode: WatchMode) {
        self.watch.watch(dir, mode);
    }

    pub fn unwatch(&mut self, dir: &Path, mode: WatchMode) {
        self.watch.unwatch(dir, mode);
    }

    pub fn clear_watch(&mut self, mask: WatchMode) {
        self.watch.clear(mask);
    }

    pub fn watched_paths(&self) -> &HashMap<PathBuf, WatchMode> {
        self.watch.watched_paths()
    }

    // Suspend control.

    /// Toggle automatic indexing for a file; returns the new suspended
    /// state.
    pub fn toggle_suspend_file(&mut self, file_id: FileId) -> bool {
        if self.suspended.remove(&file_id) {
            false
        } else {
            self.suspended.insert(file_id);
            true
        }
    }

    pub fn is_suspended(&self, file_id: FileId) -> bool {
        self.suspended.contains(&file_id)
    }

    pub fn clear_suspended_files(&mut self) {
        self.suspended.clear();
    }

    pub fn suspended_files(&self) -> &HashSet<FileId> {
        &self.suspended
    }

    // Diagnostics surface.

    pub fn diagnose(&self, file_id: FileId) -> &[Diagnostic] {
        self.diagnostics.get(&file_id).map_or(&[], Vec::as_slice)
    }

    pub fn diagnose_all(&self) -> &HashMap<FileId, Vec<Diagnostic>> {
        &self.diagnostics
    }

    pub fn fix_its_for(&self, file_id: FileId) -> &[FixIt] {
        self.fix_its.get(&file_id).map_or(&[], Vec::as_slice)
    }

    // Persistence.

    /// Save project state, deferring while jobs are active so persisted
    /// dependencies never diverge from the on-disk maps.
    pub fn save(&mut self) -> ProjectResult<()> {
        if !self.active_jobs.is_empty() {
            self.save_pending = true;
            return Ok(());
        }
        self.save_now()
    }

    fn save_now(&mut self) -> ProjectResult<()> {
        self.save_pending = false;
        let sources: Vec<Source> = self.sources.values().flatten().cloned().collect();
        self.persistence.save_sources(&SourcesFile::new(
            sources,
            self.compilation_database.clone(),
        ))?;
        self.persistence.save_project(&ProjectFile::new(
            self.registry.snapshot(),
            self.dependencies.edges(),
            self.visited.snapshot(),
            self.dirty.snapshot(),
        ))?;
        tracing::debug!("project state saved");
        Ok(())
    }

    // Administrative surface.

    pub fn estimate_memory(&self) -> MemoryEstimate {
        use std::mem::size_of;
        let sources = self
            .sources
            .values()
            .flatten()
            .map(|s| {
                size_of::<Source>()
                    + s.path.as_os_str().len()
                    + s.compiler.as_os_str().len()
                    + s.args.iter().map(String::len).sum::<usize>()
            })
            .sum();
        let fix_its = self
            .fix_its
            .values()
            .flatten()
            .map(|f| size_of::<FixIt>() + f.replacement.len())
            .sum();
        let diagnostics = self
            .diagnostics
            .values()
            .flatten()
            .map(|d| size_of::<Diagnostic>() + d.message.len())
            .sum();
        MemoryEstimate {
            sources,
            dependencies: self.dependencies.estimated_bytes(),
            visited: self.visited.estimated_bytes(),
            fix_its,
            diagnostics,
        }
    }

    /// Serialize the sources as a compilation database: a JSON array of
    /// `{directory, file, arguments}` records.
    pub fn to_compilation_database(&self) -> serde_json::Value {
        let records: Vec<serde_json::Value> = self
            .sources
            .values()
            .flatten()
            .map(|source| {
                let directory = self
                    .compilation_database
                    .as_ref()
                    .map(|db| db.dir.clone())
                    .or_else(|| source.path.parent().map(Path::to_path_buf))
                    .unwrap_or_else(|| self.root.clone());
                let mut arguments = vec![source.compiler.to_string_lossy().into_owned()];
                arguments.extend(source.args.iter().cloned());
                serde_json::json!({
                    "directory": directory,
                    "file": source.path,
                    "arguments": arguments,
                })
            })
            .collect();
        serde_json::Value::Array(records)
    }

    /// Files with maps to query: every source plus every graph node.
    pub(crate) fn indexed_files(&self) -> BTreeSet<FileId> {
        self.sources
            .keys()
            .copied()
            .chain(self.dependencies.files())
            .collect()
    }

    /// Schedule re-indexing for files whose maps failed to open.
    pub(crate) fn mark_load_failures(&mut self, failed: BTreeSet<FileId>) {
        for file_id in failed {
            tracing::warn!("file map load failed for {file_id}, scheduling re-index");
            self.dirty.mark(file_id);
        }
    }
}
