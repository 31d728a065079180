//! File-based logging
//!
//! stdout carries command output and the request/response stream, so logs
//! go to a file instead.

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::Logging;

const LOG_FILE_PREFIX: &str = "spotify-group-queue";

/// Initialize the logging system.
///
/// Logs are written to `<dir>/spotify-group-queue.YYYY-MM-DD.log` with daily
/// rotation. `RUST_LOG` takes precedence over the configured filter.
pub fn init_logging(config: &Logging) -> anyhow::Result<()> {
    if !config.dir.exists() {
        std::fs::create_dir_all(&config.dir)?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.dir, LOG_FILE_PREFIX);

    // Non-blocking so the async runtime never waits on disk
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the guard alive for the lifetime of the process
    Box::leak(Box::new(guard));

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Logging initialized - logs written to {}/", config.dir.display());

    Ok(())
}
