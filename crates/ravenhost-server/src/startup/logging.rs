//! Logging initialization
//!
//! Console output plus a daily-rotated `ravenhost.log` file. The level comes
//! from `RUST_LOG` when set, defaulting to `info`.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use ravenhost_common::{RavenHostError, Result};
use ravenhost_core::Configuration;

/// Initialize the tracing subscriber. The returned guard must be held for
/// the life of the process so buffered file output is flushed on exit.
pub fn init_logging(config: &Configuration) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(config.log_dir(), "ravenhost.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()
        .map_err(|e| RavenHostError::Config(format!("failed to initialize logging: {}", e)))?;

    Ok(guard)
}
