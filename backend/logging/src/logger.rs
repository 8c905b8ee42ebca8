//! Subscriber setup.
//!
//! Console output goes to stderr so that command output on stdout stays
//! machine-readable. When a directory is configured, the same events are
//! also written as NDJSON to a daily-rolling file.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log files are named `parley.YYYY-MM-DD.log`.
pub const LOG_FILE_PREFIX: &str = "parley";

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// Calling this twice is harmless; the second call leaves the first
/// subscriber in place.
pub fn init_logger(log_dir: Option<&Path>, level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = log_dir
        .map(|dir| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .build(dir)
                .with_context(|| format!("Failed to open log directory {}", dir.display()))
        })
        .transpose()?
        .map(|appender| fmt::layer().json().with_writer(appender).with_ansi(false));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}
