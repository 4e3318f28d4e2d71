//! Cross-reference repository
//!
//! The dense schema ↔ endpoint relationship table materialized at ingest
//! time. The indexer loads it wholesale to build the bidirectional
//! in-memory map.

use crate::errors::{ApiscopeError, Result};
use crate::ingest::model::UsageContext;
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct CrossReferenceRow {
    pub endpoint_id: i64,
    pub schema_name: String,
    pub context: String,
    pub content_type: Option<String>,
    pub required: bool,
    pub score: f64,
}

/// One usage edge between an endpoint and a schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossReferenceData {
    pub endpoint_id: i64,
    pub schema_name: String,
    pub context: UsageContext,
    pub content_type: Option<String>,
    pub required: bool,
    pub score: f64,
}

impl TryFrom<CrossReferenceRow> for CrossReferenceData {
    type Error = ApiscopeError;

    fn try_from(row: CrossReferenceRow) -> Result<Self> {
        let context = UsageContext::parse(&row.context).ok_or_else(|| {
            ApiscopeError::internal(format!("Corrupt usage context '{}'", row.context))
        })?;
        Ok(Self {
            endpoint_id: row.endpoint_id,
            schema_name: row.schema_name,
            context,
            content_type: row.content_type,
            required: row.required,
            score: row.score,
        })
    }
}

const SELECT_COLUMNS: &str = "endpoint_id, schema_name, context, content_type, required, score";

/// Repository for cross-reference access
#[derive(Debug, Clone)]
pub struct CrossReferenceRepository {
    pool: DbPool,
}

impl CrossReferenceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Every usage edge of a document
    #[instrument(skip(self), name = "db_list_cross_references")]
    pub async fn list_for_document(&self, document_id: i64) -> Result<Vec<CrossReferenceData>> {
        let rows = sqlx::query_as::<_, CrossReferenceRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM endpoint_schema_refs WHERE document_id = $1 ORDER BY endpoint_id, schema_name"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiscopeError::database(e, "Failed to list cross references".to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Usage edges pointing at one schema
    #[instrument(skip(self), name = "db_list_schema_usages")]
    pub async fn list_for_schema(
        &self,
        document_id: i64,
        schema_name: &str,
    ) -> Result<Vec<CrossReferenceData>> {
        let rows = sqlx::query_as::<_, CrossReferenceRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM endpoint_schema_refs WHERE document_id = $1 AND schema_name = $2 ORDER BY endpoint_id"
        ))
        .bind(document_id)
        .bind(schema_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            ApiscopeError::database(e, format!("Failed to list usages of '{schema_name}'"))
        })?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Usage edges originating at one endpoint
    #[instrument(skip(self), name = "db_list_endpoint_usages")]
    pub async fn list_for_endpoint(&self, endpoint_id: i64) -> Result<Vec<CrossReferenceData>> {
        let rows = sqlx::query_as::<_, CrossReferenceRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM endpoint_schema_refs WHERE endpoint_id = $1 ORDER BY schema_name"
        ))
        .bind(endpoint_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            ApiscopeError::database(e, format!("Failed to list usages for endpoint {endpoint_id}"))
        })?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
