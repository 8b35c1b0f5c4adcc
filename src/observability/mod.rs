//! Observability: logging setup and metric descriptions.

mod logging;
pub mod metrics;

pub use self::logging::{LOG_ENV_VAR, LogFormat, LoggingConfig};
pub use self::metrics::describe_metrics;

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if logging was already initialized by
/// this crate or another global subscriber is installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(init_error("logging already initialized"));
    }

    let registry = tracing_subscriber::registry().with(config.filter());
    match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(config.ansi)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
    }
    .map_err(|e| init_error(e.to_string()))?;

    LOGGING_INIT
        .set(())
        .map_err(|()| init_error("failed to mark logging initialized"))?;
    describe_metrics();
    Ok(())
}

fn init_error(cause: impl Into<String>) -> Error {
    Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: cause.into(),
    }
}
