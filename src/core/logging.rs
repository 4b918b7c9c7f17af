// ─── Logging ───
// Structured logging to stderr plus a daily rolling service log under
// `<data>/logs/`.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::state::paths::SERVICE_LOG_PREFIX;

pub const DEFAULT_FILTER: &str = "info,p1lot_launcher_lib=debug";
const SERVICE_LOG_SUFFIX: &str = "log";
const SERVICE_LOGS_KEPT: usize = 7;

/// Keeps the file writer flushing. Drop it only at shutdown.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber. The rolling file sink is skipped, with a
/// warning, when `logs_dir` cannot be used. Calling this twice is harmless.
pub fn init_logging(logs_dir: &Path) -> LoggingGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let appender = std::fs::create_dir_all(logs_dir)
        .map_err(|e| e.to_string())
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(SERVICE_LOG_PREFIX)
                .filename_suffix(SERVICE_LOG_SUFFIX)
                .max_log_files(SERVICE_LOGS_KEPT)
                .build(logs_dir)
                .map_err(|e| e.to_string())
        });

    match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            LoggingGuard { _file: Some(guard) }
        }
        Err(err) => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init();
            tracing::warn!("Service log disabled ({:?}): {}", logs_dir, err);
            LoggingGuard { _file: None }
        }
    }
}

/// Newest rolling service log in `logs_dir`.
pub fn latest_service_log(logs_dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(logs_dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(SERVICE_LOG_PREFIX)
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}
