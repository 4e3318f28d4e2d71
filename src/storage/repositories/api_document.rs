//! API document repository
//!
//! Lookups for ingested specification documents. One row per ingested file,
//! identified by the content hash of its source bytes.

use crate::errors::{ApiscopeError, Result};
use crate::ingest::model::DocumentInfo;
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;

/// Database row structure for API documents
#[derive(Debug, Clone, FromRow)]
struct ApiDocumentRow {
    pub id: i64,
    pub title: String,
    pub version: String,
    pub openapi_version: String,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub contact: Option<String>,
    pub license: Option<String>,
    pub servers: String,
    pub content_hash: String,
    pub file_path: String,
    pub file_size: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// API document data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDocumentData {
    pub id: i64,
    pub info: DocumentInfo,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<ApiDocumentRow> for ApiDocumentData {
    type Error = ApiscopeError;

    fn try_from(row: ApiDocumentRow) -> Result<Self> {
        let servers: Vec<String> = serde_json::from_str(&row.servers)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'servers' column"))?;
        let contact = row
            .contact
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'contact' column"))?;
        let license = row
            .license
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'license' column"))?;

        Ok(Self {
            id: row.id,
            info: DocumentInfo {
                title: row.title,
                version: row.version,
                openapi_version: row.openapi_version,
                description: row.description,
                base_url: row.base_url,
                contact,
                license,
                servers,
                content_hash: row.content_hash,
                file_path: row.file_path,
                file_size: row.file_size as u64,
            },
            created_at: row.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, title, version, openapi_version, description, base_url, contact, license, servers, content_hash, file_path, file_size, created_at";

/// Repository for API document access
#[derive(Debug, Clone)]
pub struct ApiDocumentRepository {
    pool: DbPool,
}

impl ApiDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a document by ID
    #[instrument(skip(self), name = "db_get_document_by_id")]
    pub async fn get_by_id(&self, id: i64) -> Result<ApiDocumentData> {
        let row = sqlx::query_as::<_, ApiDocumentRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM api_documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, document_id = id, "Failed to get document by ID");
            ApiscopeError::database(e, format!("Failed to get document with ID '{id}'"))
        })?;

        match row {
            Some(row) => row.try_into(),
            None => Err(ApiscopeError::not_found("ApiDocument", id.to_string())),
        }
    }

    /// Get a document by the content hash of its source bytes
    #[instrument(skip(self), name = "db_get_document_by_hash")]
    pub async fn get_by_hash(&self, content_hash: &str) -> Result<Option<ApiDocumentData>> {
        let row = sqlx::query_as::<_, ApiDocumentRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM api_documents WHERE content_hash = $1"
        ))
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            ApiscopeError::database(e, "Failed to get document by content hash".to_string())
        })?;

        row.map(TryInto::try_into).transpose()
    }

    /// List documents, newest first
    #[instrument(skip(self), name = "db_list_documents")]
    pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<ApiDocumentData>> {
        let rows = sqlx::query_as::<_, ApiDocumentRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM api_documents ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiscopeError::database(e, "Failed to list documents".to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Most recently ingested document, if any
    #[instrument(skip(self), name = "db_latest_document")]
    pub async fn latest(&self) -> Result<Option<ApiDocumentData>> {
        Ok(self.list(0, 1).await?.into_iter().next())
    }

    /// Delete a document and, via foreign keys, all of its records
    #[instrument(skip(self), name = "db_delete_document")]
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM api_documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                ApiscopeError::database(e, format!("Failed to delete document '{id}'"))
            })?;

        if result.rows_affected() == 0 {
            return Err(ApiscopeError::not_found("ApiDocument", id.to_string()));
        }
        tracing::info!(document_id = id, "Deleted API document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::{memory_pool, test_document};
    use crate::storage::writer::commit_document;

    #[tokio::test]
    async fn test_get_by_id_and_hash() {
        let pool = memory_pool().await;
        let commit = commit_document(&pool, &test_document()).await.unwrap();

        let repo = ApiDocumentRepository::new(pool);
        let by_id = repo.get_by_id(commit.document_id).await.unwrap();
        assert_eq!(by_id.info.title, "Test API");

        let by_hash = repo.get_by_hash(&by_id.info.content_hash).await.unwrap();
        assert_eq!(by_hash.unwrap().id, commit.document_id);

        assert!(repo.get_by_hash("no-such-hash").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_missing_document_is_not_found() {
        let pool = memory_pool().await;
        let repo = ApiDocumentRepository::new(pool);
        let err = repo.get_by_id(999).await.unwrap_err();
        assert!(matches!(err, ApiscopeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let pool = memory_pool().await;
        let commit = commit_document(&pool, &test_document()).await.unwrap();

        let repo = ApiDocumentRepository::new(pool.clone());
        repo.delete(commit.document_id).await.unwrap();

        let endpoints: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM endpoints")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(endpoints, 0);

        let schemas: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM schemas").fetch_one(&pool).await.unwrap();
        assert_eq!(schemas, 0);
    }
}
