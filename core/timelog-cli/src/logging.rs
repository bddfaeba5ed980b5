//! Log subscriber setup.
//!
//! Logs go to a daily-rolling file under `<root>/logs/` through a non-blocking
//! writer. The returned guard flushes that writer on drop, so `main` keeps it
//! alive until exit. When the log directory is unusable, warnings and errors
//! go to stderr instead.

use std::env;

use timelog_core::StorageConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

const LOG_FILTER_ENV: &str = "TIMELOG_LOG";
const DEBUG_LOG_ENV: &str = "TIMELOG_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "timelog";
const MAX_LOG_FILES: usize = 14;

fn debug_enabled() -> bool {
    env::var(DEBUG_LOG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn file_filter() -> EnvFilter {
    if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let logs_dir = storage.logs_dir();
    let appender = storage
        .ensure_dirs()
        .map_err(|e| e.to_string())
        .and_then(|()| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .max_log_files(MAX_LOG_FILES)
                .build(&logs_dir)
                .map_err(|e| e.to_string())
        });

    match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let installed = tracing_subscriber::fmt()
                .with_env_filter(file_filter())
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .is_ok();
            installed.then_some(guard)
        }
        Err(err) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("warn"))
                .with_writer(std::io::stderr)
                .try_init();
            tracing::warn!(
                error = %err,
                path = %logs_dir.display(),
                "Log directory unavailable; logging to stderr"
            );
            None
        }
    }
}
