//! Save and restore of project state.
//!
//! Two bincode files under the data directory: `sources.bin` (what to
//! compile) and `project.bin` (what the index learned). Both are written
//! atomically via a temp file and carry a version gate; a mismatch or decode
//! failure degrades to an empty project and a full re-index.

use crate::error::{ProjectError, ProjectResult};
use crate::types::FileId;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use super::source::{CompilationDatabaseInfo, Source};

pub const STATE_VERSION: u32 = 1;

const SOURCES_FILE: &str = "sources.bin";
const PROJECT_FILE: &str = "project.bin";

/// Contents of `sources.bin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesFile {
    pub version: u32,
    pub sources: Vec<Source>,
    pub compilation_database: Option<CompilationDatabaseInfo>,
}

impl SourcesFile {
    pub fn new(sources: Vec<Source>, compilation_database: Option<CompilationDatabaseInfo>) -> Self {
        Self {
            version: STATE_VERSION,
            sources,
            compilation_database,
        }
    }
}

/// Contents of `project.bin`. Dependency edges store the include direction
/// only; reverse links are recomputed on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub version: u32,
    /// Path-registry seed, so file ids stay stable across restarts.
    pub paths: Vec<(FileId, PathBuf)>,
    pub dependencies: Vec<(FileId, Vec<FileId>)>,
    pub visited: Vec<(FileId, PathBuf)>,
    pub dirty: Vec<FileId>,
}

impl ProjectFile {
    pub fn new(
        paths: Vec<(FileId, PathBuf)>,
        dependencies: Vec<(FileId, Vec<FileId>)>,
        visited: Vec<(FileId, PathBuf)>,
        dirty: Vec<FileId>,
    ) -> Self {
        Self {
            version: STATE_VERSION,
            paths,
            dependencies,
            visited,
            dirty,
        }
    }
}

/// Persists project state under one data directory.
#[derive(Debug, Clone)]
pub struct ProjectPersistence {
    data_dir: PathBuf,
}

impl ProjectPersistence {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn sources_path(&self) -> PathBuf {
        self.data_dir.join(SOURCES_FILE)
    }

    pub fn project_path(&self) -> PathBuf {
        self.data_dir.join(PROJECT_FILE)
    }

    pub fn exists(&self) -> bool {
        self.sources_path().exists()
    }

    pub fn save_sources(&self, file: &SourcesFile) -> ProjectResult<()> {
        write_state(&self.sources_path(), file)
    }

    pub fn save_project(&self, file: &ProjectFile) -> ProjectResult<()> {
        write_state(&self.project_path(), file)
    }

    pub fn load_sources(&self) -> ProjectResult<SourcesFile> {
        let file: SourcesFile = read_state(&self.sources_path())?;
        check_version(&self.sources_path(), file.version)?;
        Ok(file)
    }

    pub fn load_project(&self) -> ProjectResult<ProjectFile> {
        let file: ProjectFile = read_state(&self.project_path())?;
        check_version(&self.project_path(), file.version)?;
        Ok(file)
    }
}

/// Read a persisted sources file from an arbitrary path. For external
/// restore tooling.
pub fn read_sources(path: &Path) -> ProjectResult<SourcesFile> {
    let file: SourcesFile = read_state(path)?;
    check_version(path, file.version)?;
    Ok(file)
}

fn check_version(path: &Path, found: u32) -> ProjectResult<()> {
    if found != STATE_VERSION {
        return Err(ProjectError::VersionMismatch {
            path: path.to_path_buf(),
            found,
            expected: STATE_VERSION,
        });
    }
    Ok(())
}

fn write_state<T: Serialize>(path: &Path, value: &T) -> ProjectResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ProjectError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = bincode::serialize(value).map_err(|source| ProjectError::Persist {
        path: path.to_path_buf(),
        source,
    })?;

    let temp = path.with_extension("tmp");
    std::fs::write(&temp, &data).map_err(|source| ProjectError::FileWrite {
        path: temp.clone(),
        source,
    })?;
    std::fs::rename(&temp, path).map_err(|source| ProjectError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn read_state<T: DeserializeOwned>(path: &Path) -> ProjectResult<T> {
    let data = std::fs::read(path).map_err(|source| ProjectError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize(&data).map_err(|source| ProjectError::Restore {
        path: path.to_path_buf(),
        source,
    })
}
