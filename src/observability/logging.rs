//! # Structured Logging
//!
//! Tracing-subscriber initialization: env-filter based level control,
//! human-readable or JSON output, and an optional non-blocking file
//! appender.

use crate::config::ObservabilityConfig;
use crate::errors::{ApiscopeError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber. Returns the appender guard
/// when file logging is enabled; the caller must keep it alive.
pub fn init_logging(config: &ObservabilityConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.log_level).map_err(|e| {
        ApiscopeError::config(format!("Invalid log level '{}': {}", config.log_level, e))
    })?;

    // The MCP transport owns stdout; logs must stay on stderr or in files.
    match &config.log_dir {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "apiscope.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if config.log_json {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json().with_writer(writer))
                    .try_init()
                    .map_err(|e| {
                        ApiscopeError::config_with_source("Failed to initialize logging", e.into())
                    })?;
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_ansi(false).with_writer(writer))
                    .try_init()
                    .map_err(|e| {
                        ApiscopeError::config_with_source("Failed to initialize logging", e.into())
                    })?;
            }
            Ok(Some(guard))
        }
        None => {
            if config.log_json {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .try_init()
                    .map_err(|e| {
                        ApiscopeError::config_with_source("Failed to initialize logging", e.into())
                    })?;
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .try_init()
                    .map_err(|e| {
                        ApiscopeError::config_with_source("Failed to initialize logging", e.into())
                    })?;
            }
            Ok(None)
        }
    }
}
