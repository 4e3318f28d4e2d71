//! # Observability
//!
//! Structured logging, metrics, and component health for the server.

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{check, ComponentHealth, HealthReport, HealthStatus};
pub use logging::init_logging;
pub use metrics::{init_metrics, MetricsRecorder};
