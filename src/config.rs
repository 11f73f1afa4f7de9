//! Configuration for the project core.
//!
//! Layered settings: built-in defaults, then a TOML file, then environment
//! variable overrides.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `REFDEX_` and use double underscores to
//! separate nested levels:
//! - `REFDEX_INDEXING__DEBOUNCE_MS=200` sets `indexing.debounce_ms`
//! - `REFDEX_QUERY__MAX_OPEN_MAPS=128` sets `query.max_open_maps`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding persisted project state and per-file symbol maps
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Indexing configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Milliseconds a dirty file must rest before re-index jobs start
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Number of concurrent indexer jobs
    #[serde(default = "default_job_count")]
    pub job_count: usize,

    /// Save project state whenever the active-job table drains
    #[serde(default = "default_true")]
    pub save_on_idle: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueryConfig {
    /// Maximum file maps held open by one query scope
    #[serde(default = "default_max_open_maps")]
    pub max_open_maps: usize,

    /// Ask the kernel to prefault map pages on open
    #[serde(default = "default_false")]
    pub preload_maps: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level filter ("error", "warn", "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".refdex")
}
fn default_debounce_ms() -> u64 {
    500
}
fn default_job_count() -> usize {
    num_cpus::get()
}
fn default_max_open_maps() -> usize {
    64
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            indexing: IndexingConfig::default(),
            query: QueryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            job_count: default_job_count(),
            save_on_idle: true,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_open_maps: default_max_open_maps(),
            preload_maps: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings: defaults, then `refdex.toml` at `config_path` (if any),
    /// then `REFDEX_`-prefixed environment variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("REFDEX_").split("__")).extract()
    }
}
