//! Error types for the project core.
//!
//! Structured error enums per subsystem, built on thiserror. None of these is
//! fatal to the process; a failed map open marks the file for re-index, a
//! corrupt persisted state degrades to an empty project.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from opening or reading an on-disk file map.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("failed to open file map '{path}': {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file map '{path}' is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to decode file map entry in '{path}': {source}")]
    Decode {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error("failed to write file map '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode file map entry for '{path}': {source}")]
    Encode {
        path: PathBuf,
        source: bincode::Error,
    },
}

impl MapError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from project lifecycle and persistence operations.
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to persist project state to '{path}': {source}")]
    Persist {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error("failed to restore project state from '{path}': {source}")]
    Restore {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error("persisted state '{path}' has version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("invalid compilation database '{path}': {reason}")]
    CompilationDatabase { path: PathBuf, reason: String },

    #[error(transparent)]
    Map(#[from] MapError),
}

/// Errors from filesystem watch registration.
///
/// Watch failures are warnings: the project keeps running without the watch.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to watch '{dir}': {source}")]
    Register {
        dir: PathBuf,
        source: notify::Error,
    },

    #[error("failed to unwatch '{dir}': {source}")]
    Unregister {
        dir: PathBuf,
        source: notify::Error,
    },
}

pub type MapResult<T> = Result<T, MapError>;
pub type ProjectResult<T> = Result<T, ProjectError>;
