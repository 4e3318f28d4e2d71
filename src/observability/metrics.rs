//! # Metrics Collection
//!
//! Prometheus metrics via the `metrics` facade. The exporter is optional;
//! when disabled, recording macros are cheap no-ops against the default
//! recorder.

use crate::config::ObservabilityConfig;
use crate::errors::{ApiscopeError, Result};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Start the Prometheus exporter when enabled.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.enable_metrics {
        return Ok(());
    }

    let address: SocketAddr = config.metrics_address.parse().map_err(|e| {
        ApiscopeError::config(format!(
            "Invalid metrics address '{}': {}",
            config.metrics_address, e
        ))
    })?;

    PrometheusBuilder::new().with_http_listener(address).install().map_err(|e| {
        ApiscopeError::config_with_source("Failed to install Prometheus exporter", Box::new(e))
    })?;

    info!(address = %address, "Prometheus metrics exporter listening");
    Ok(())
}

/// Domain-specific recording helpers grouped behind one facade.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record one completed ingest.
    pub fn record_ingest(&self, endpoints: usize, schemas: usize, duration_ms: u64) {
        counter!("ingest_runs_total").increment(1);
        gauge!("ingest_endpoints_total").set(endpoints as f64);
        gauge!("ingest_schemas_total").set(schemas as f64);
        histogram!("ingest_duration_ms").record(duration_ms as f64);
    }

    /// Record an index rebuild and swap.
    pub fn record_index_swap(&self, documents: usize, vocabulary: usize) {
        counter!("index_rebuilds_total").increment(1);
        gauge!("index_documents_total").set(documents as f64);
        gauge!("index_vocabulary_size").set(vocabulary as f64);
    }

    /// Update database pool gauges.
    pub fn update_pool(&self, stats: &crate::storage::PoolStats) {
        gauge!("db_connections_total").set(stats.size as f64);
        gauge!("db_connections_active").set(stats.active() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_disabled_is_noop() {
        let config = ObservabilityConfig { enable_metrics: false, ..Default::default() };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_invalid_address_is_config_error() {
        let config = ObservabilityConfig {
            enable_metrics: true,
            metrics_address: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(init_metrics(&config).is_err());
    }

    #[test]
    fn test_recorder_is_cheap_without_exporter() {
        let recorder = MetricsRecorder::new();
        recorder.record_ingest(10, 5, 120);
        recorder.record_index_swap(15, 300);
    }
}
