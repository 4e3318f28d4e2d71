//! Application startup and wiring
//!
//! Builds the shared server state, runs ingests, and rebuilds the search
//! index. Ingest is strictly sequential: parse → normalize → commit →
//! index swap.

use crate::config::AppConfig;
use crate::errors::{ApiscopeError, Result};
use crate::ingest;
use crate::mcp::ServerState;
use crate::observability::MetricsRecorder;
use crate::search::IndexSnapshot;
use crate::storage::{self, ApiDocumentRepository};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Counters reported after one ingest.
#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub document_id: i64,
    pub created: bool,
    pub endpoints: usize,
    pub schemas: usize,
    pub errors: usize,
    pub warnings: usize,
}

/// Build the shared state: pool, migrations, store version gate, and the
/// index snapshot for the most recently ingested document.
pub async fn build_state(config: AppConfig) -> Result<Arc<ServerState>> {
    let pool = storage::create_pool(&config.database).await?;
    storage::check_store_version(&pool).await?;

    let state = Arc::new(ServerState::new(pool, config));
    refresh_index(&state).await?;
    Ok(state)
}

/// Rebuild the index snapshot from the latest committed document and swap
/// it in. A store without documents installs the empty snapshot.
pub async fn refresh_index(state: &Arc<ServerState>) -> Result<()> {
    let latest = ApiDocumentRepository::new(state.pool.clone()).latest().await?;
    match latest {
        Some(document) => {
            let snapshot = IndexSnapshot::load(&state.pool, document.id).await?;
            MetricsRecorder::new().record_index_swap(
                snapshot.index.endpoint_docs.len() + snapshot.index.schema_docs.len(),
                snapshot.index.vocabulary().len(),
            );
            state.search.install(snapshot).await;
        }
        None => {
            info!("No ingested documents; serving with an empty index");
            state.search.install(IndexSnapshot::empty()).await;
        }
    }
    Ok(())
}

/// Ingest one specification file, commit it atomically, and refresh the
/// index.
pub async fn ingest_and_index(state: &Arc<ServerState>, path: &Path) -> Result<IngestSummary> {
    let started = std::time::Instant::now();
    let config = state.config.ingest.clone();
    let path_buf: PathBuf = path.to_path_buf();

    // Parsing is synchronous file I/O; keep it off the async workers.
    let document = tokio::task::spawn_blocking(move || ingest::ingest_file(&path_buf, &config))
        .await
        .map_err(|e| ApiscopeError::internal(format!("Ingest task panicked: {e}")))??;

    for issue in &document.errors {
        warn!(location = %issue.location, "Ingest error: {}", issue.message);
    }
    for issue in &document.warnings {
        info!(location = %issue.location, "Ingest warning: {}", issue.message);
    }

    let commit = storage::commit_document(&state.pool, &document).await?;
    refresh_index(state).await?;

    MetricsRecorder::new().record_ingest(
        document.endpoints.len(),
        document.schemas.len(),
        started.elapsed().as_millis() as u64,
    );
    info!(
        document_id = commit.document_id,
        created = commit.created,
        endpoints = document.endpoints.len(),
        schemas = document.schemas.len(),
        errors = document.errors.len(),
        warnings = document.warnings.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Ingest finished"
    );

    Ok(IngestSummary {
        document_id: commit.document_id,
        created: commit.created,
        endpoints: document.endpoints.len(),
        schemas: document.schemas.len(),
        errors: document.errors.len(),
        warnings: document.warnings.len(),
    })
}

/// Run the MCP server until stdin closes or a shutdown signal arrives.
pub async fn run_server(state: Arc<ServerState>) -> Result<()> {
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received; requesting shutdown");
            shutdown.cancel();
        }
    });

    crate::mcp::server::run_stdio(state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, DatabaseConfig};
    use std::io::Write;

    fn memory_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                url: "sqlite://:memory:".to_string(),
                max_connections: 1,
                min_connections: 1,
                auto_migrate: true,
                ..DatabaseConfig::default()
            },
            ..AppConfig::default()
        }
    }

    fn fixture_file() -> tempfile::NamedTempFile {
        let spec = serde_json::json!({
            "openapi": "3.0.3",
            "info": {"title": "Startup Test", "version": "1.0.0"},
            "paths": {
                "/things": {"get": {"summary": "List things"}}
            },
            "components": {"schemas": {"Thing": {"type": "object"}}}
        });
        let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(spec.to_string().as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_build_ingest_and_search() {
        let state = build_state(memory_config()).await.unwrap();
        let file = fixture_file();

        let summary = ingest_and_index(&state, file.path()).await.unwrap();
        assert!(summary.created);
        assert_eq!(summary.endpoints, 1);
        assert_eq!(summary.schemas, 1);

        let response = state
            .search
            .search_endpoints("things", &serde_json::json!({}), 1, 10)
            .await
            .unwrap();
        assert_eq!(response.pagination.total, 1);
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let state = build_state(memory_config()).await.unwrap();
        let file = fixture_file();

        let first = ingest_and_index(&state, file.path()).await.unwrap();
        let second = ingest_and_index(&state, file.path()).await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.document_id, second.document_id);
    }
}
