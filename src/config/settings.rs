//! # Configuration Settings
//!
//! Defines the configuration structure for the apiscope server.

use crate::errors::{ApiscopeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Specification ingest configuration
    #[validate(nested)]
    pub ingest: IngestConfig,

    /// Search configuration
    #[validate(nested)]
    pub search: SearchConfig,

    /// Tool resilience configuration
    #[validate(nested)]
    pub resilience: ResilienceConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(ApiscopeError::from)?;
        self.validate_custom()?;
        Ok(())
    }

    /// Custom validation logic that goes beyond what the validator crate can do
    fn validate_custom(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite://") {
            return Err(ApiscopeError::validation("Database URL must start with 'sqlite://'"));
        }

        if self.search.default_per_page > self.search.max_per_page {
            return Err(ApiscopeError::validation(
                "search.default_per_page cannot exceed search.max_per_page",
            ));
        }

        if self.resilience.breaker_probe_successes == 0 {
            return Err(ApiscopeError::validation(
                "resilience.breaker_probe_successes must be at least 1",
            ));
        }

        Ok(())
    }
}

/// MCP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server name advertised during MCP initialize
    #[validate(length(min = 1, message = "Server name cannot be empty"))]
    pub name: String,

    /// Grace period for in-flight requests during shutdown, in seconds
    #[validate(range(min = 1, max = 120, message = "Grace period must be between 1 and 120 seconds"))]
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { name: "apiscope".to_string(), shutdown_grace_seconds: 10 }
    }
}

impl ServerConfig {
    /// Get the shutdown grace period as Duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[validate(range(max = 50, message = "Min connections must be at most 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60 seconds"))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/apiscope.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }
}

/// Specification ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestConfig {
    /// Emit a progress event every this many input bytes
    #[validate(range(min = 65536, message = "Progress interval must be at least 64KiB"))]
    pub progress_interval_bytes: u64,

    /// Validate the OpenAPI envelope (openapi/swagger, info, paths).
    /// Disable for maximum throughput on trusted input.
    pub validate_envelope: bool,

    /// Maximum accepted input size in bytes
    #[validate(range(min = 1024, message = "Max spec size must be at least 1KiB"))]
    pub max_spec_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            progress_interval_bytes: 2 * 1024 * 1024,
            validate_envelope: true,
            max_spec_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchConfig {
    /// Default page size when the caller does not specify one
    #[validate(range(min = 1, max = 100, message = "Default page size must be between 1 and 100"))]
    pub default_per_page: usize,

    /// Maximum page size accepted from callers. Hard ceiling 100.
    #[validate(range(min = 1, max = 100, message = "Max page size must be between 1 and 100"))]
    pub max_per_page: usize,

    /// Result cache capacity (entries)
    #[validate(range(min = 1, max = 65536, message = "Cache size must be between 1 and 65536"))]
    pub cache_size: usize,

    /// Result cache entry time-to-live in seconds
    #[validate(range(min = 1, max = 86400, message = "Cache TTL must be between 1s and 24h"))]
    pub cache_ttl_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_per_page: 20, max_per_page: 50, cache_size: 256, cache_ttl_seconds: 300 }
    }
}

impl SearchConfig {
    /// Get cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

/// Tool resilience configuration: timeout, circuit breaker, retry, concurrency
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResilienceConfig {
    /// Default per-tool timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Tool timeout must be between 1 and 300 seconds"))]
    pub tool_timeout_seconds: u64,

    /// Consecutive failures that open the circuit breaker
    #[validate(range(min = 1, max = 100, message = "Breaker threshold must be between 1 and 100"))]
    pub breaker_failure_threshold: u32,

    /// Failure window in seconds; failures older than this do not count
    #[validate(range(min = 1, max = 3600, message = "Breaker window must be between 1s and 1h"))]
    pub breaker_window_seconds: u64,

    /// Cooldown before the breaker admits probe traffic, in seconds
    #[validate(range(min = 1, max = 3600, message = "Breaker cooldown must be between 1s and 1h"))]
    pub breaker_cooldown_seconds: u64,

    /// Consecutive probe successes that close the breaker again
    #[validate(range(min = 1, max = 20, message = "Probe successes must be between 1 and 20"))]
    pub breaker_probe_successes: u32,

    /// Base delay for exponential retry backoff, in milliseconds
    #[validate(range(min = 1, max = 10000, message = "Retry base delay must be between 1ms and 10s"))]
    pub retry_base_delay_ms: u64,

    /// Maximum backoff delay in seconds
    #[validate(range(min = 1, max = 600, message = "Retry max delay must be between 1s and 10m"))]
    pub retry_max_delay_seconds: u64,

    /// Maximum concurrent tool executions
    #[validate(range(min = 1, max = 1024, message = "Concurrency cap must be between 1 and 1024"))]
    pub max_concurrency: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            tool_timeout_seconds: 30,
            breaker_failure_threshold: 5,
            breaker_window_seconds: 60,
            breaker_cooldown_seconds: 30,
            breaker_probe_successes: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_seconds: 60,
            max_concurrency: 20,
        }
    }
}

impl ResilienceConfig {
    /// Get the default tool timeout as Duration
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_seconds)
    }

    /// Get the breaker failure window as Duration
    pub fn breaker_window(&self) -> Duration {
        Duration::from_secs(self.breaker_window_seconds)
    }

    /// Get the breaker cooldown as Duration
    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_seconds)
    }

    /// Get the retry base delay as Duration
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Get the retry delay ceiling as Duration
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_secs(self.retry_max_delay_seconds)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level filter (e.g., "info", "apiscope=debug,info")
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text
    pub log_json: bool,

    /// Optional log file directory; logs go to stderr when unset
    pub log_dir: Option<String>,

    /// Enable the Prometheus metrics exporter
    pub enable_metrics: bool,

    /// Prometheus exporter bind address
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            log_dir: None,
            enable_metrics: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_sqlite_url() {
        let mut config = AppConfig::default();
        config.database.url = "postgresql://localhost/apiscope".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_page_sizes() {
        let mut config = AppConfig::default();
        config.search.default_per_page = 80;
        config.search.max_per_page = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_accessors() {
        let config = ResilienceConfig::default();
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
        assert_eq!(config.breaker_window(), Duration::from_secs(60));
        assert_eq!(config.retry_base_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_idle_timeout_zero_means_none() {
        let mut config = DatabaseConfig::default();
        config.idle_timeout_seconds = 0;
        assert!(config.idle_timeout().is_none());
    }
}
