//! # Component Health
//!
//! Component-level health checks (database, search index, request engine)
//! with a rolled-up status, served through the `apiscope://health` MCP
//! resource.

use crate::mcp::resilience::BreakerState;
use crate::mcp::ServerState;
use crate::storage::get_pool_stats;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health of one component or of the whole server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One component's health with a short detail line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Rolled-up health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub tools: Vec<crate::mcp::monitoring::ToolMetricsSummary>,
}

/// Check every component. The rollup is unhealthy if any component is,
/// else degraded if any component is, else healthy.
pub async fn check(state: &ServerState) -> HealthReport {
    let mut components = Vec::new();

    // Database reachability with a trivial round trip.
    let started = Instant::now();
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => {
            let stats = get_pool_stats(&state.pool);
            ComponentHealth {
                name: "database".to_string(),
                status: HealthStatus::Healthy,
                detail: format!("{} connections, {} idle", stats.size, stats.idle),
                latency_ms: Some(started.elapsed().as_millis() as u64),
            }
        }
        Err(e) => ComponentHealth {
            name: "database".to_string(),
            status: HealthStatus::Unhealthy,
            detail: format!("query failed: {e}"),
            latency_ms: Some(started.elapsed().as_millis() as u64),
        },
    };
    components.push(database);

    // Search index: degraded until a document has been ingested.
    let snapshot = state.search.snapshot().await;
    components.push(match snapshot.document_id {
        Some(document_id) => ComponentHealth {
            name: "search_index".to_string(),
            status: HealthStatus::Healthy,
            detail: format!(
                "document {document_id}, {} endpoints indexed",
                snapshot.index.endpoint_docs.len()
            ),
            latency_ms: None,
        },
        None => ComponentHealth {
            name: "search_index".to_string(),
            status: HealthStatus::Degraded,
            detail: "no document ingested".to_string(),
            latency_ms: None,
        },
    });

    // Request engine: breaker state plus concurrency headroom.
    let breaker = state.breaker.state();
    components.push(ComponentHealth {
        name: "request_engine".to_string(),
        status: match breaker {
            BreakerState::Closed => HealthStatus::Healthy,
            BreakerState::HalfOpen => HealthStatus::Degraded,
            BreakerState::Open => HealthStatus::Unhealthy,
        },
        detail: format!(
            "breaker {:?}, {}/{} execution slots free",
            breaker,
            state.slots.available(),
            state.slots.limit()
        ),
        latency_ms: None,
    });

    let status = components
        .iter()
        .map(|c| c.status)
        .fold(HealthStatus::Healthy, |acc, status| match (acc, status) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        });

    HealthReport { status, components, tools: state.monitor.summary() }
}
