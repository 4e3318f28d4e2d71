//! Endpoint repository
//!
//! Lookups for canonical endpoint records: by id, by (document, path,
//! method), and filtered listings for the indexer and the tool layer.

use crate::errors::{ApiscopeError, Result};
use crate::ingest::model::{
    NormalizedEndpoint, ParameterRecord, RequestBodyRecord, ResponseRecord, SecurityRequirement,
};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;

/// Database row structure for endpoints
#[derive(Debug, Clone, FromRow)]
struct EndpointRow {
    pub id: i64,
    pub document_id: i64,
    pub path: String,
    pub method: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: String,
    pub parameters: String,
    pub request_body: Option<String>,
    pub responses: String,
    pub security: String,
    pub deprecated: bool,
    pub extensions: String,
}

/// Endpoint record data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointData {
    pub id: i64,
    pub document_id: i64,
    pub record: NormalizedEndpoint,
}

impl TryFrom<EndpointRow> for EndpointData {
    type Error = ApiscopeError;

    fn try_from(row: EndpointRow) -> Result<Self> {
        let tags: Vec<String> = serde_json::from_str(&row.tags)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'tags' column"))?;
        let parameters: Vec<ParameterRecord> = serde_json::from_str(&row.parameters)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'parameters' column"))?;
        let request_body: Option<RequestBodyRecord> = row
            .request_body
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'request_body' column"))?;
        let responses: Vec<ResponseRecord> = serde_json::from_str(&row.responses)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'responses' column"))?;
        let security: Vec<SecurityRequirement> = serde_json::from_str(&row.security)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'security' column"))?;
        let extensions: Vec<(String, serde_json::Value)> = serde_json::from_str(&row.extensions)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'extensions' column"))?;

        Ok(Self {
            id: row.id,
            document_id: row.document_id,
            record: NormalizedEndpoint {
                path: row.path,
                method: row.method,
                operation_id: row.operation_id,
                summary: row.summary,
                description: row.description,
                tags,
                parameters,
                request_body,
                responses,
                security,
                deprecated: row.deprecated,
                extensions,
            },
        })
    }
}

const SELECT_COLUMNS: &str = "id, document_id, path, method, operation_id, summary, description, tags, parameters, request_body, responses, security, deprecated, extensions";

/// Repository for endpoint data access
#[derive(Debug, Clone)]
pub struct EndpointRepository {
    pool: DbPool,
}

impl EndpointRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get an endpoint by ID
    #[instrument(skip(self), name = "db_get_endpoint_by_id")]
    pub async fn get_by_id(&self, id: i64) -> Result<EndpointData> {
        let row = sqlx::query_as::<_, EndpointRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM endpoints WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, endpoint_id = id, "Failed to get endpoint by ID");
            ApiscopeError::database(e, format!("Failed to get endpoint with ID '{id}'"))
        })?;

        match row {
            Some(row) => row.try_into(),
            None => Err(ApiscopeError::not_found("Endpoint", id.to_string())),
        }
    }

    /// Get an endpoint by (document, path, method)
    #[instrument(skip(self), name = "db_get_endpoint_by_path_method")]
    pub async fn get_by_path_method(
        &self,
        document_id: i64,
        path: &str,
        method: &str,
    ) -> Result<Option<EndpointData>> {
        let row = sqlx::query_as::<_, EndpointRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM endpoints WHERE document_id = $1 AND path = $2 AND method = $3"
        ))
        .bind(document_id)
        .bind(path)
        .bind(method)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            ApiscopeError::database(
                e,
                format!("Failed to get endpoint '{method} {path}'"),
            )
        })?;

        row.map(TryInto::try_into).transpose()
    }

    /// Endpoints registered under a path, any method
    #[instrument(skip(self), name = "db_get_endpoints_by_path")]
    pub async fn get_by_path(&self, document_id: i64, path: &str) -> Result<Vec<EndpointData>> {
        let rows = sqlx::query_as::<_, EndpointRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM endpoints WHERE document_id = $1 AND path = $2 ORDER BY method"
        ))
        .bind(document_id)
        .bind(path)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            ApiscopeError::database(e, format!("Failed to get endpoints for path '{path}'"))
        })?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Filtered listing with offset/limit, ordered by path then method
    #[instrument(skip(self), name = "db_list_endpoints")]
    pub async fn list(&self, document_id: i64, offset: i64, limit: i64) -> Result<Vec<EndpointData>> {
        let rows = sqlx::query_as::<_, EndpointRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM endpoints WHERE document_id = $1 ORDER BY path, method LIMIT $2 OFFSET $3"
        ))
        .bind(document_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiscopeError::database(e, "Failed to list endpoints".to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Every endpoint of a document, ordered by path then method. Used by
    /// the indexer when rebuilding the search index from the store.
    #[instrument(skip(self), name = "db_list_all_endpoints")]
    pub async fn list_all(&self, document_id: i64) -> Result<Vec<EndpointData>> {
        self.list(document_id, 0, i64::MAX).await
    }

    /// Number of endpoints in a document
    #[instrument(skip(self), name = "db_count_endpoints")]
    pub async fn count(&self, document_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM endpoints WHERE document_id = $1")
            .bind(document_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ApiscopeError::database(e, "Failed to count endpoints".to_string()))
    }

    /// Every (path, method) pair of a document; used for similar-name hints
    #[instrument(skip(self), name = "db_list_endpoint_keys")]
    pub async fn list_keys(&self, document_id: i64) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT path, method FROM endpoints WHERE document_id = $1 ORDER BY path, method",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiscopeError::database(e, "Failed to list endpoint keys".to_string()))?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::{memory_pool, test_document};
    use crate::storage::writer::commit_document;

    #[tokio::test]
    async fn test_lookup_by_path_method() {
        let pool = memory_pool().await;
        let commit = commit_document(&pool, &test_document()).await.unwrap();
        let repo = EndpointRepository::new(pool);

        let endpoint = repo
            .get_by_path_method(commit.document_id, "/api/v1/users", "GET")
            .await
            .unwrap()
            .expect("endpoint should exist");
        assert_eq!(endpoint.record.method, "GET");
        assert_eq!(endpoint.record.summary.as_deref(), Some("List users"));

        let missing = repo
            .get_by_path_method(commit.document_id, "/api/v1/users", "PATCH")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_is_ordered_and_bounded() {
        let pool = memory_pool().await;
        let commit = commit_document(&pool, &test_document()).await.unwrap();
        let repo = EndpointRepository::new(pool);

        let all = repo.list_all(commit.document_id).await.unwrap();
        assert_eq!(all.len(), 3);
        let paths: Vec<&str> = all.iter().map(|e| e.record.path.as_str()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);

        let page = repo.list(commit.document_id, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].record.path, all[1].record.path);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_record() {
        let pool = memory_pool().await;
        let document = test_document();
        let commit = commit_document(&pool, &document).await.unwrap();
        let repo = EndpointRepository::new(pool);

        let stored = repo
            .get_by_path_method(commit.document_id, "/api/v1/users", "POST")
            .await
            .unwrap()
            .unwrap();
        let original =
            document.endpoints.iter().find(|e| e.method == "POST").unwrap();

        assert_eq!(stored.record.security.len(), original.security.len());
        assert_eq!(
            stored.record.request_body.as_ref().map(|b| b.required),
            original.request_body.as_ref().map(|b| b.required)
        );
        assert_eq!(stored.record.responses.len(), original.responses.len());
    }
}
