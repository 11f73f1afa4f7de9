pub mod config;
pub mod error;
pub mod filemap;
pub mod graph;
pub mod logging;
pub mod paths;
pub mod project;
pub mod query;
pub mod symbol;
pub mod types;

pub use config::Settings;
pub use error::{MapError, MapResult, ProjectError, ProjectResult, WatchError};
pub use filemap::{FileMap, FileMapStore, MapFlags, MapKind};
pub use graph::{DependencyGraph, DependencyMode};
pub use paths::PathRegistry;
pub use project::{
    CompilationDatabaseInfo, FileSystemWatcher, FsEvent, IndexReason, IndexResult, IndexerBackend,
    IndexerJob, JobContext, JobOutcome, MemoryEstimate, NotifyWatcher, Project, ProjectDriver,
    Source, VisitedFiles, WatchMode, read_sources,
};
pub use query::{MatchType, QueryFlags, QueryScope, SortFlags, SortedSymbol};
pub use symbol::{Diagnostic, DiagnosticLevel, FixIt, Symbol, SymbolFlags, SymbolKind};
pub use types::{FileId, Location, SourceKey};
