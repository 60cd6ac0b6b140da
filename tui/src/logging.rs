//! File logging
//!
//! The alternate screen owns the terminal, so logs go to a file.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use furiabot_core::credentials::DATA_DIR_NAME;

/// Log file name inside the state directory
pub const LOG_FILENAME: &str = "tui.log";

/// `$XDG_STATE_HOME/furiabot/tui.log`, falling back to the data dir
#[must_use]
pub fn default_log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(DATA_DIR_NAME)
        .join(LOG_FILENAME)
}

/// Filter for an explicit level, or `RUST_LOG`, or `info`
#[must_use]
pub fn build_filter(level: Option<&str>) -> EnvFilter {
    let directives = |level: &str| format!("furiabot_tui={level},furiabot_core={level}");
    match level {
        Some(level) => EnvFilter::new(directives(level)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives("info"))),
    }
}

/// Install the global subscriber writing to `path`
///
/// # Errors
///
/// Fails when the log file cannot be created.
pub fn init_logging(level: Option<&str>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {parent:?}"))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {path:?}"))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(build_filter(level))
        .init();

    Ok(())
}
