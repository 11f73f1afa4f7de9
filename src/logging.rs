//! Logging setup for the project core.
//!
//! `RUST_LOG` wins when set; otherwise the filter is assembled from the
//! `[logging]` config section. Module keys may be bare subsystem names
//! ("project", "filemap"), which expand to this crate's targets:
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! project = "debug"   # refdex::project=debug
//! notify = "error"    # external crates pass through untouched
//! ```

use std::sync::Once;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::uptime;

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Subsystems accepted as bare names in `[logging.modules]`.
const SUBSYSTEMS: &[&str] = &["project", "filemap", "graph", "query", "paths", "symbol"];

fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.default.clone();
    for (module, level) in &config.modules {
        let target = if SUBSYSTEMS.contains(&module.as_str()) {
            format!("{}::{module}", env!("CARGO_PKG_NAME"))
        } else {
            module.clone()
        };
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Initialize logging from configuration. Safe to call more than once;
/// only the first call takes effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(uptime())
            .with_target(true)
            .init();
    });
}

/// Initialize logging with the default configuration (quiet, `warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}
