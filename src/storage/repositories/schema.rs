//! Schema repository
//!
//! Lookups for named component schemas: by (document, name) plus full and
//! name-only listings for the indexer, the resolver, and similar-name
//! suggestions.

use crate::errors::{ApiscopeError, Result};
use crate::ingest::model::NormalizedSchema;
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;

/// Database row structure for schemas
#[derive(Debug, Clone, FromRow)]
struct SchemaRow {
    pub id: i64,
    pub document_id: i64,
    pub name: String,
    pub schema_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: String,
    pub dependencies: String,
    pub used_by: String,
    pub deprecated: bool,
    pub extensions: String,
}

/// Schema record data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaData {
    pub id: i64,
    pub document_id: i64,
    pub record: NormalizedSchema,
}

impl TryFrom<SchemaRow> for SchemaData {
    type Error = ApiscopeError;

    fn try_from(row: SchemaRow) -> Result<Self> {
        let body = serde_json::from_str(&row.body)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'body' column"))?;
        let dependencies: Vec<String> = serde_json::from_str(&row.dependencies)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'dependencies' column"))?;
        let used_by: Vec<String> = serde_json::from_str(&row.used_by)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'used_by' column"))?;
        let extensions: Vec<(String, serde_json::Value)> = serde_json::from_str(&row.extensions)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'extensions' column"))?;

        Ok(Self {
            id: row.id,
            document_id: row.document_id,
            record: NormalizedSchema {
                name: row.name,
                schema_type: row.schema_type,
                title: row.title,
                description: row.description,
                body,
                dependencies,
                used_by,
                deprecated: row.deprecated,
                extensions,
            },
        })
    }
}

const SELECT_COLUMNS: &str = "id, document_id, name, schema_type, title, description, body, dependencies, used_by, deprecated, extensions";

/// Repository for schema data access
#[derive(Debug, Clone)]
pub struct SchemaRepository {
    pool: DbPool,
}

impl SchemaRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a schema by ID
    #[instrument(skip(self), name = "db_get_schema_by_id")]
    pub async fn get_by_id(&self, id: i64) -> Result<SchemaData> {
        let row = sqlx::query_as::<_, SchemaRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM schemas WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            ApiscopeError::database(e, format!("Failed to get schema with ID '{id}'"))
        })?;

        match row {
            Some(row) => row.try_into(),
            None => Err(ApiscopeError::not_found("Schema", id.to_string())),
        }
    }

    /// Get a schema by (document, name)
    #[instrument(skip(self), name = "db_get_schema_by_name")]
    pub async fn get_by_name(&self, document_id: i64, name: &str) -> Result<Option<SchemaData>> {
        let row = sqlx::query_as::<_, SchemaRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM schemas WHERE document_id = $1 AND name = $2"
        ))
        .bind(document_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            ApiscopeError::database(e, format!("Failed to get schema '{name}'"))
        })?;

        row.map(TryInto::try_into).transpose()
    }

    /// Every schema of a document, ordered by name
    #[instrument(skip(self), name = "db_list_all_schemas")]
    pub async fn list_all(&self, document_id: i64) -> Result<Vec<SchemaData>> {
        let rows = sqlx::query_as::<_, SchemaRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM schemas WHERE document_id = $1 ORDER BY name"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiscopeError::database(e, "Failed to list schemas".to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Schema names of a document, ordered; cheap input for similar-name
    /// suggestions
    #[instrument(skip(self), name = "db_list_schema_names")]
    pub async fn list_names(&self, document_id: i64) -> Result<Vec<String>> {
        let names: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM schemas WHERE document_id = $1 ORDER BY name")
                .bind(document_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    ApiscopeError::database(e, "Failed to list schema names".to_string())
                })?;
        Ok(names.into_iter().map(|(name,)| name).collect())
    }

    /// Number of schemas in a document
    #[instrument(skip(self), name = "db_count_schemas")]
    pub async fn count(&self, document_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM schemas WHERE document_id = $1")
            .bind(document_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ApiscopeError::database(e, "Failed to count schemas".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::{memory_pool, test_document};
    use crate::storage::writer::commit_document;

    #[tokio::test]
    async fn test_get_by_name_round_trips_body() {
        let pool = memory_pool().await;
        let document = test_document();
        let commit = commit_document(&pool, &document).await.unwrap();
        let repo = SchemaRepository::new(pool);

        let stored = repo.get_by_name(commit.document_id, "User").await.unwrap().unwrap();
        let original = document.schemas.iter().find(|s| s.name == "User").unwrap();
        assert_eq!(stored.record.body, original.body);
        assert_eq!(stored.record.dependencies, original.dependencies);

        assert!(repo.get_by_name(commit.document_id, "Ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_names_sorted() {
        let pool = memory_pool().await;
        let commit = commit_document(&pool, &test_document()).await.unwrap();
        let repo = SchemaRepository::new(pool);

        let names = repo.list_names(commit.document_id).await.unwrap();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"User".to_string()));
    }
}
