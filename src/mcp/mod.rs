//! # MCP Request Engine
//!
//! The layer between the MCP transport and the core: JSON-RPC protocol
//! types, tool dispatch with parameter validation, the resilience envelope,
//! per-request performance capture, and response shaping.

pub mod error;
pub mod handler;
pub mod monitoring;
pub mod protocol;
pub mod resilience;
pub mod server;
pub mod tools;
pub mod validation;

pub use error::McpError;
pub use handler::McpHandler;

use crate::config::AppConfig;
use crate::mcp::monitoring::ToolMonitor;
use crate::mcp::resilience::{CircuitBreaker, ResourcePool};
use crate::search::SearchService;
use crate::storage::DbPool;
use tokio_util::sync::CancellationToken;

/// Protocol version this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Shared state behind every MCP request. Monitors, the breaker, and the
/// concurrency pool are process-global and injected at construction; no
/// hidden singletons.
pub struct ServerState {
    pub pool: DbPool,
    pub search: SearchService,
    pub monitor: ToolMonitor,
    pub breaker: CircuitBreaker,
    pub slots: ResourcePool,
    pub config: AppConfig,
    pub shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        Self {
            pool,
            search: SearchService::new(config.search.clone()),
            monitor: ToolMonitor::new(),
            breaker: CircuitBreaker::new(&config.resilience),
            slots: ResourcePool::new(config.resilience.max_concurrency),
            config,
            shutdown: CancellationToken::new(),
        }
    }
}
