//! # Apiscope
//!
//! Apiscope ingests an OpenAPI/Swagger specification, normalizes it into a
//! queryable model, and exposes that model to AI agents over the Model
//! Context Protocol (MCP): keyword search over endpoints, transitive schema
//! resolution, and runnable client-code examples.
//!
//! ## Architecture
//!
//! Data flows left-to-right at ingest time and right-to-left at query time:
//!
//! ```text
//! spec file → Parser → Normalizer → Store → Indexer → Search Index
//!                                     ↑                    │
//!                                 Resolver ←── Request Engine ←── MCP call
//! ```
//!
//! ## Core Components
//!
//! - **Ingest Pipeline**: streaming JSON/YAML decode into canonical records
//! - **Store**: SQLx/SQLite repositories with one atomic write per document
//! - **Search Core**: searchable documents, inverted index, query and result
//!   processors
//! - **Request Engine**: MCP tool dispatch wrapped in a resilience envelope
//!   (timeout, circuit breaker, retry, bounded concurrency)

pub mod cli;
pub mod codegen;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ingest;
pub mod mcp;
pub mod observability;
pub mod resolver;
pub mod search;
pub mod startup;
pub mod storage;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{ApiscopeError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
