//! Logging configuration for sqlhub.
//!
//! Diagnostics go to stderr by default so stdout stays clean for the JSON
//! report. `--log-file` redirects them to a file instead.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes logging to `path`, truncating it on each run.
///
/// Falls back to stderr if the file cannot be created.
pub fn init_file_logging(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging();
            return;
        }
    }

    let log_file = match File::create(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            init_stderr_logging();
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the default log file path.
///
/// Uses the XDG state directory on Linux (`~/.local/state/sql-query-hub/sqlhub.log`),
/// or falls back to the config directory on other platforms.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("sql-query-hub").join("sqlhub.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("sql-query-hub").join("sqlhub.log");
    }

    std::env::temp_dir().join("sqlhub.log")
}
