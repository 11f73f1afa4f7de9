//! Translation-unit sources and the compilation database.

use crate::error::{ProjectError, ProjectResult};
use crate::types::{FileId, SourceKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// One compilable translation unit: path plus how it is compiled.
///
/// A file compiled under several argument sets yields several `Source`s; the
/// [`SourceKey`] tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub file_id: FileId,
    pub path: PathBuf,
    pub compiler: PathBuf,
    pub args: Vec<String>,
    /// Mtime (seconds since epoch) when last indexed; 0 when unknown.
    pub last_modified: u64,
    key: SourceKey,
}

impl Source {
    pub fn new(
        file_id: FileId,
        path: impl Into<PathBuf>,
        compiler: impl Into<PathBuf>,
        args: Vec<String>,
    ) -> Self {
        let path = path.into();
        let compiler = compiler.into();
        let key = compute_key(&path, &compiler, &args);
        Self {
            file_id,
            path,
            compiler,
            args,
            last_modified: 0,
            key,
        }
    }

    pub fn key(&self) -> SourceKey {
        self.key
    }

    /// Record the file's current on-disk stamp.
    pub fn stamp(&mut self) {
        self.last_modified = mtime_of(&self.path);
    }

    /// Whether the file on disk is newer than what was indexed.
    pub fn is_stale(&self) -> bool {
        mtime_of(&self.path) != self.last_modified
    }
}

/// Sources sharing one file id.
pub type SourceList = Vec<Source>;

/// Stable 64-bit key over (path, args, compiler).
fn compute_key(path: &Path, compiler: &Path, args: &[String]) -> SourceKey {
    let mut hasher = Sha256::new();
    hasher.update(path.as_os_str().as_encoded_bytes());
    hasher.update([0]);
    hasher.update(compiler.as_os_str().as_encoded_bytes());
    for arg in args {
        hasher.update([0]);
        hasher.update(arg.as_bytes());
    }
    let digest = hasher.finalize();
    SourceKey::new(u64::from_be_bytes(
        digest[..8].try_into().expect("digest is 32 bytes"),
    ))
}

/// Mtime in seconds since the epoch; 0 when the file cannot be statted.
pub fn mtime_of(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Metadata about the compilation database feeding this project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationDatabaseInfo {
    pub dir: PathBuf,
    pub last_modified: u64,
    pub path_environment: Vec<String>,
    pub index_flags: Vec<String>,
}

impl CompilationDatabaseInfo {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_modified: 0,
            path_environment: Vec::new(),
            index_flags: Vec::new(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.dir.join("compile_commands.json")
    }
}

/// One entry of `compile_commands.json`, with `file` resolved against
/// `directory` and `command` split when `arguments` is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub file: PathBuf,
    pub arguments: Vec<String>,
}

#[derive(Deserialize)]
struct RawCompileCommand {
    directory: PathBuf,
    file: PathBuf,
    #[serde(default)]
    arguments: Vec<String>,
    #[serde(default)]
    command: Option<String>,
}

/// Parse a `compile_commands.json`.
///
/// Command strings are split on whitespace; arguments with embedded spaces
/// need the `arguments` array form.
pub fn load_compile_commands(path: &Path) -> ProjectResult<Vec<CompileCommand>> {
    let data = std::fs::read(path).map_err(|source| ProjectError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: Vec<RawCompileCommand> =
        serde_json::from_slice(&data).map_err(|e| ProjectError::CompilationDatabase {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut commands = Vec::with_capacity(raw.len());
    for entry in raw {
        let arguments = if !entry.arguments.is_empty() {
            entry.arguments
        } else if let Some(command) = entry.command {
            command.split_whitespace().map(str::to_owned).collect()
        } else {
            return Err(ProjectError::CompilationDatabase {
                path: path.to_path_buf(),
                reason: format!(
                    "entry for '{}' has neither arguments nor command",
                    entry.file.display()
                ),
            });
        };
        let file = if entry.file.is_absolute() {
            entry.file
        } else {
            entry.directory.join(&entry.file)
        };
        commands.push(CompileCommand {
            directory: entry.directory,
            file,
            arguments,
        });
    }
    Ok(commands)
}

/// Match a path against a user-supplied pattern: empty matches everything,
/// `*`/`?` switch to glob semantics, anything else is a substring test.
pub fn path_matches(pattern: &str, path: &Path) -> bool {
    if pattern.is_empty() {
        return true;
    }
    let text = path.to_string_lossy();
    if pattern.contains(['*', '?']) {
        glob::Pattern::new(pattern)
            .map(|p| p.matches(&text))
            .unwrap_or(false)
    } else {
        text.contains(pattern)
    }
}
