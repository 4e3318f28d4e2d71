//! # Configuration Management
//!
//! Configuration for the apiscope server. Supports multiple configuration
//! sources: defaults, an optional file, and environment variables.

pub mod settings;

pub use settings::{
    AppConfig, DatabaseConfig, IngestConfig, ObservabilityConfig, ResilienceConfig, SearchConfig,
    ServerConfig,
};

use crate::errors::{ApiscopeError, Result};
use config::{Config, Environment, File};
use std::path::Path;

/// Load application configuration from multiple sources
///
/// Configuration is loaded in the following order (later sources override
/// earlier ones):
/// 1. Default values
/// 2. Configuration file (if specified)
/// 3. Environment variables with APISCOPE_ prefix
pub fn load_config<P: AsRef<Path>>(config_path: Option<P>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    builder = builder.add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        let path = path.as_ref();
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ApiscopeError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
    }

    builder = builder
        .add_source(Environment::with_prefix("APISCOPE").separator("__").try_parsing(true));

    let config = builder.build().map_err(|e| {
        ApiscopeError::config_with_source("Failed to build configuration", Box::new(e))
    })?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ApiscopeError::config_with_source("Failed to deserialize configuration", Box::new(e))
    })?;

    app_config.validate()?;

    Ok(app_config)
}

/// Load configuration from environment variables only
pub fn load_config_from_env() -> Result<AppConfig> {
    load_config::<&str>(None)
}
