//! Diagnostic logging.
//!
//! Filter comes from `WEFT_LOG` (falling back to `RUST_LOG`, then `warn`).
//! Output goes to stderr so stdout stays reserved for translated events,
//! or to `log_file` when configured.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const DEFAULT_FILTER: &str = "warn";

fn resolve_env_filter() -> EnvFilter {
    if let Ok(level) = std::env::var("WEFT_LOG")
        && let Ok(filter) = EnvFilter::try_new(level)
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Later calls are no-ops.
///
/// # Errors
/// Returns an error if the log file directory cannot be created or the file
/// cannot be opened.
pub fn init(log_file: Option<&str>) -> Result<()> {
    let env_filter = resolve_env_filter();

    match log_file.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let writer = file_appender(Path::new(raw))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(layer)
                .try_init();
        }
        None => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(layer)
                .try_init();
        }
    }
    Ok(())
}

fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("weft.log");

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
