//! Logging infrastructure for alertline.
//!
//! Structured logging using the `tracing` ecosystem, written to two sinks:
//!
//! - JSON lines in a daily-rotated file (`alertline.log.YYYY-MM-DD`)
//! - Compact human-readable output on stderr
//!
//! ## Example
//!
//! ```no_run
//! use alertline_core::logging;
//!
//! // Initialize logging (call once at startup)
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! tracing::info!("alertline started");
//! tracing::debug!(alert_id = "4711", "alert seen");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{AlertlineError, Result};

/// Base name of the rotated log file.
pub const LOG_FILE_PREFIX: &str = "alertline.log";

/// Crates whose events pass the default filter.
const LOG_TARGETS: &[&str] = &[
    "alertline",
    "alertline_core",
    "alertline_source",
    "alertline_notify",
    "alertline_monitor",
];

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the alertline logging system.
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.alertline/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses INFO.
///
/// `RUST_LOG` overrides the level selection entirely.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| AlertlineError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));

    // One JSON object per line; the date suffix is added by the appender
    let file_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_ansi(false)
        .with_writer(non_blocking_file);

    let console_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_file(verbose)
        .with_line_number(verbose);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| AlertlineError::internal(format!("logging already initialized: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Console-only subscriber captured by the test harness. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new(default_directives("debug")))
        .with_test_writer()
        .try_init();
}

/// Get the default log directory path.
///
/// Returns `~/.alertline/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".alertline").join("logs"))
        .ok_or_else(|| AlertlineError::internal("home directory not found"))
}

fn default_directives(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}
