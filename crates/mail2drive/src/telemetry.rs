//! Process-wide tracing setup.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LoggingConfig;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install log bridge: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

/// Installs the global subscriber and routes `log` records into it. Call
/// once at startup.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), TelemetryError> {
    tracing_log::LogTracer::init()?;

    let registry = Registry::default().with(env_filter(logging));
    if logging.json {
        let subscriber = registry.with(fmt::layer().json().with_current_span(true).with_span_list(false));
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = registry.with(fmt::layer().with_target(false));
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}
