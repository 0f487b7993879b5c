use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

pub const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the global subscriber. Buffered lines are flushed when the guard drops,
/// so the caller keeps it alive until shutdown.
pub fn init(format: LogFormat) -> anyhow::Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?,
        LogFormat::Pretty => registry.with(fmt::layer().with_writer(writer)).try_init()?,
    }
    Ok(guard)
}
