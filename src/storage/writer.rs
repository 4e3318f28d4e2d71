//! Ingest write path
//!
//! One ingest is one write transaction: the document row, its endpoints,
//! schemas, security schemes, and cross-reference edges all land together
//! or not at all. Re-ingesting bytes whose content hash is already present
//! is a no-op, which makes ingest idempotent.

use crate::errors::{ApiscopeError, Result};
use crate::ingest::model::NormalizedDocument;
use crate::storage::DbPool;
use tracing::{info, instrument};

/// Result of committing a normalized document.
#[derive(Debug, Clone, Copy)]
pub struct DocumentCommit {
    pub document_id: i64,
    /// False when the content hash was already present and nothing was
    /// written.
    pub created: bool,
}

/// Commit a normalized document to the store in a single transaction.
#[instrument(skip(pool, document), fields(title = %document.info.title), name = "db_commit_document")]
pub async fn commit_document(pool: &DbPool, document: &NormalizedDocument) -> Result<DocumentCommit> {
    // Idempotence gate: identical source bytes are already committed.
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM api_documents WHERE content_hash = $1")
            .bind(&document.info.content_hash)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                ApiscopeError::database(e, "Failed to check for existing document".to_string())
            })?;

    if let Some((document_id,)) = existing {
        info!(
            document_id,
            content_hash = %document.info.content_hash,
            "Document already ingested; skipping"
        );
        return Ok(DocumentCommit { document_id, created: false });
    }

    let mut tx = pool.begin().await.map_err(|e| {
        ApiscopeError::database(e, "Failed to start ingest transaction".to_string())
    })?;

    let info = &document.info;
    let now = chrono::Utc::now();
    let document_id = sqlx::query(
        "INSERT INTO api_documents (title, version, openapi_version, description, base_url, contact, license, servers, content_hash, file_path, file_size, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(&info.title)
    .bind(&info.version)
    .bind(&info.openapi_version)
    .bind(&info.description)
    .bind(&info.base_url)
    .bind(info.contact.as_ref().map(|v| v.to_string()))
    .bind(info.license.as_ref().map(|v| v.to_string()))
    .bind(serde_json::to_string(&info.servers)?)
    .bind(&info.content_hash)
    .bind(&info.file_path)
    .bind(info.file_size as i64)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiscopeError::database(e, "Failed to insert document row".to_string()))?
    .last_insert_rowid();

    let mut endpoint_ids = Vec::with_capacity(document.endpoints.len());
    for endpoint in &document.endpoints {
        let id = sqlx::query(
            "INSERT INTO endpoints (document_id, path, method, operation_id, summary, description, tags, parameters, request_body, responses, security, deprecated, extensions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(document_id)
        .bind(&endpoint.path)
        .bind(&endpoint.method)
        .bind(&endpoint.operation_id)
        .bind(&endpoint.summary)
        .bind(&endpoint.description)
        .bind(serde_json::to_string(&endpoint.tags)?)
        .bind(serde_json::to_string(&endpoint.parameters)?)
        .bind(endpoint.request_body.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&endpoint.responses)?)
        .bind(serde_json::to_string(&endpoint.security)?)
        .bind(endpoint.deprecated)
        .bind(serde_json::to_string(&endpoint.extensions)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiscopeError::database(
                e,
                format!("Failed to insert endpoint '{} {}'", endpoint.method, endpoint.path),
            )
        })?
        .last_insert_rowid();
        endpoint_ids.push(id);
    }

    for schema in &document.schemas {
        sqlx::query(
            "INSERT INTO schemas (document_id, name, schema_type, title, description, body, dependencies, used_by, deprecated, extensions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(document_id)
        .bind(&schema.name)
        .bind(&schema.schema_type)
        .bind(&schema.title)
        .bind(&schema.description)
        .bind(schema.body.to_string())
        .bind(serde_json::to_string(&schema.dependencies)?)
        .bind(serde_json::to_string(&schema.used_by)?)
        .bind(schema.deprecated)
        .bind(serde_json::to_string(&schema.extensions)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiscopeError::database(e, format!("Failed to insert schema '{}'", schema.name))
        })?;
    }

    for scheme in &document.security_schemes {
        sqlx::query(
            "INSERT INTO security_schemes (document_id, name, kind, description, body) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(document_id)
        .bind(&scheme.name)
        .bind(scheme.kind.as_str())
        .bind(&scheme.description)
        .bind(scheme.body.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiscopeError::database(e, format!("Failed to insert security scheme '{}'", scheme.name))
        })?;
    }

    for usage in &document.usages {
        let Some(endpoint_id) = endpoint_ids.get(usage.endpoint_index) else {
            return Err(ApiscopeError::internal(format!(
                "Usage references endpoint index {} outside the batch",
                usage.endpoint_index
            )));
        };
        sqlx::query(
            "INSERT INTO endpoint_schema_refs (document_id, endpoint_id, schema_name, context, content_type, required, score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(document_id)
        .bind(endpoint_id)
        .bind(&usage.schema_name)
        .bind(usage.context.as_str())
        .bind(&usage.content_type)
        .bind(usage.required)
        .bind(usage.score)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            ApiscopeError::database(e, "Failed to insert cross-reference edge".to_string())
        })?;
    }

    tx.commit().await.map_err(|e| {
        ApiscopeError::database(e, "Failed to commit ingest transaction".to_string())
    })?;

    info!(
        document_id,
        endpoints = document.endpoints.len(),
        schemas = document.schemas.len(),
        security_schemes = document.security_schemes.len(),
        usages = document.usages.len(),
        "Committed API document"
    );
    metrics::counter!("ingest_documents_total").increment(1);

    Ok(DocumentCommit { document_id, created: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::{memory_pool, test_document};

    #[tokio::test]
    async fn test_commit_is_idempotent_for_same_hash() {
        let pool = memory_pool().await;
        let document = test_document();

        let first = commit_document(&pool, &document).await.unwrap();
        assert!(first.created);

        let second = commit_document(&pool, &document).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.document_id, second.document_id);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_documents")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let endpoints: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM endpoints").fetch_one(&pool).await.unwrap();
        assert_eq!(endpoints, document.endpoints.len() as i64);
    }

    #[tokio::test]
    async fn test_commit_writes_all_record_types() {
        let pool = memory_pool().await;
        let document = test_document();
        commit_document(&pool, &document).await.unwrap();

        let schemas: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM schemas").fetch_one(&pool).await.unwrap();
        assert_eq!(schemas, document.schemas.len() as i64);

        let schemes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM security_schemes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(schemes, document.security_schemes.len() as i64);

        let refs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM endpoint_schema_refs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(refs, document.usages.len() as i64);
    }
}
