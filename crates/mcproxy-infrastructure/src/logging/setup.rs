//! Daemon-wide structured logging setup.
//!
//! Built on `tracing-subscriber`'s `EnvFilter` + `fmt` layers, matching
//! the teacher's layered-subscriber approach: one layer writes
//! human-readable (or JSON, in production) output to stderr, a second
//! optional layer writes JSON lines to a rotating daemon log file.

use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Parses a level string (`"trace"|"debug"|"info"|"warn"|"error"`),
/// falling back to `info` on anything unrecognized rather than
/// failing startup over a typo in `logging.level`.
#[must_use]
pub fn parse_log_level(raw: &str) -> Level {
    raw.parse().unwrap_or(Level::INFO)
}

/// Installs the global `tracing` subscriber for the daemon process.
///
/// Returns the [`WorkerGuard`]s for the non-blocking file writers;
/// these must be held for the lifetime of the process (dropping one
/// stops flushing that sink).
///
/// # Errors
/// Returns an error only if a subscriber is already installed
/// (calling this twice in one process is a bug, not a runtime error
/// callers should expect to recover from).
pub fn init_logging(
    level: &str,
    log_dir: &Path,
    to_stderr: bool,
) -> Result<Vec<WorkerGuard>, tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let mut guards = Vec::new();

    let stderr_layer = to_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    });

    std::fs::create_dir_all(log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(log_dir, "mcproxyd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    guards.push(guard);
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .boxed();

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guards)
}
