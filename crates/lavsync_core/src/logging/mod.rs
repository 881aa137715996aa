//! Tracing setup.
//!
//! The library itself only emits `tracing` events. Binaries and tests call
//! one of the initializers below once at startup.
//!
//! # Example
//!
//! ```no_run
//! use lavsync_core::logging::{init_tracing_with_file, LogLevel};
//!
//! // Keep the guard alive for the life of the program
//! let _guard = init_tracing_with_file(LogLevel::Debug, "logs").unwrap();
//! tracing::info!("ready");
//! ```

mod types;

pub use types::LogLevel;

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix for rolling log files.
const LOG_FILE_PREFIX: &str = "lavsync.log";

/// Initialize the global subscriber, writing to stderr.
///
/// Respects `RUST_LOG` and falls back to `default_level`.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(env_filter(default_level))
        .init();
}

/// Initialize the global subscriber, writing to stderr and to a daily
/// rolling file in `log_dir`.
///
/// The returned guard flushes the file writer on drop; hold it until exit.
pub fn init_tracing_with_file(
    default_level: LogLevel,
    log_dir: impl AsRef<Path>,
) -> io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir.as_ref())?;

    let appender = tracing_appender::rolling::daily(log_dir.as_ref(), LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(env_filter(default_level))
        .init();

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}
