//! Tracing setup.
//!
//! Hook commands write advisories to stdout, so they log to
//! `{state_dir}/logs/fixlog.log`; everything else logs to stderr.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;

const LOG_DIR: &str = "logs";
const LOG_FILE_NAME: &str = "fixlog.log";
const FILE_DEFAULT_FILTER: &str = "info";

/// Non-blocking writer appending to the shared log file. The guard must be
/// held until the process exits or buffered lines are lost.
pub fn create_log_writer(state_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let log_dir = state_dir.join(LOG_DIR);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log dir: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    Ok(tracing_appender::non_blocking(file_appender))
}

pub fn init_file_logging(state_dir: &Path) -> Option<WorkerGuard> {
    match create_log_writer(state_dir) {
        Ok((writer, guard)) => {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(FILE_DEFAULT_FILTER));
            tracing_subscriber::fmt()
                .with_writer(writer)
                .with_ansi(false)
                .with_env_filter(filter)
                .try_init()
                .ok();
            Some(guard)
        }
        Err(err) => {
            init_stderr_logging();
            tracing::warn!(error = %format!("{err:#}"), "file logging unavailable");
            None
        }
    }
}

pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();
}
