//! Security scheme repository

use crate::errors::{ApiscopeError, Result};
use crate::ingest::model::{SecuritySchemeKind, SecuritySchemeRecord};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct SecuritySchemeRow {
    pub id: i64,
    pub document_id: i64,
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub body: String,
}

/// Security scheme record data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySchemeData {
    pub id: i64,
    pub document_id: i64,
    pub record: SecuritySchemeRecord,
}

impl TryFrom<SecuritySchemeRow> for SecuritySchemeData {
    type Error = ApiscopeError;

    fn try_from(row: SecuritySchemeRow) -> Result<Self> {
        let kind = SecuritySchemeKind::parse(&row.kind).ok_or_else(|| {
            ApiscopeError::internal(format!("Corrupt security scheme kind '{}'", row.kind))
        })?;
        let body = serde_json::from_str(&row.body)
            .map_err(|e| ApiscopeError::serialization(e, "Corrupt 'body' column"))?;

        Ok(Self {
            id: row.id,
            document_id: row.document_id,
            record: SecuritySchemeRecord {
                name: row.name,
                kind,
                description: row.description,
                body,
            },
        })
    }
}

/// Repository for security scheme data access
#[derive(Debug, Clone)]
pub struct SecuritySchemeRepository {
    pool: DbPool,
}

impl SecuritySchemeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a scheme by (document, name)
    #[instrument(skip(self), name = "db_get_security_scheme")]
    pub async fn get_by_name(
        &self,
        document_id: i64,
        name: &str,
    ) -> Result<Option<SecuritySchemeData>> {
        let row = sqlx::query_as::<_, SecuritySchemeRow>(
            "SELECT id, document_id, name, kind, description, body FROM security_schemes WHERE document_id = $1 AND name = $2"
        )
        .bind(document_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            ApiscopeError::database(e, format!("Failed to get security scheme '{name}'"))
        })?;

        row.map(TryInto::try_into).transpose()
    }

    /// Every scheme of a document, ordered by name
    #[instrument(skip(self), name = "db_list_security_schemes")]
    pub async fn list_all(&self, document_id: i64) -> Result<Vec<SecuritySchemeData>> {
        let rows = sqlx::query_as::<_, SecuritySchemeRow>(
            "SELECT id, document_id, name, kind, description, body FROM security_schemes WHERE document_id = $1 ORDER BY name"
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiscopeError::database(e, "Failed to list security schemes".to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
