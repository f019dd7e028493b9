//! `tracing` subscriber setup for the sender.
//!
//! Operators read stderr. When `--log-dir` is given, every event is also
//! appended as one JSON object per line to `wasend.log.<date>` in that
//! directory, so unattended runs leave a record of what happened to each
//! message.

use std::path::Path;

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix of the JSON log; the appender adds the date.
pub const LOG_FILE_PREFIX: &str = "wasend.log";

/// Level used when `RUST_LOG` is unset or unparsable.
const DEFAULT_LEVEL: &str = "info";

/// Keeps the background log writer alive. Dropping it flushes the file.
pub struct LoggingGuard {
    _writer: WorkerGuard,
}

fn level_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Install the global subscriber.
///
/// With `log_dir`, tries stderr plus a JSON file and falls back to stderr
/// alone if the directory or subscriber cannot be set up. The returned guard
/// must outlive every log call.
pub fn init(log_dir: Option<&Path>) -> Option<LoggingGuard> {
    let Some(dir) = log_dir else {
        init_stderr();
        return None;
    };
    match init_with_file(dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            init_stderr();
            warn!(error = %e, "file logging unavailable, logging to stderr only");
            None
        }
    }
}

/// Stderr plus a daily JSON file under `logs_dir`.
///
/// # Errors
///
/// Returns an error if `logs_dir` cannot be created or a global subscriber
/// is already installed. The directory is created first either way.
pub fn init_with_file(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .map_err(|e| anyhow::anyhow!("cannot create log dir {}: {e}", logs_dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(level_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(writer),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("log subscriber already installed: {e}"))?;

    Ok(LoggingGuard { _writer: guard })
}

/// Stderr only. A second call in the same process is a no-op.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
