//! # Storage Layer
//!
//! SQLx/SQLite persistence for canonical records. One ingest is one write
//! transaction: readers see either the previous committed state or the new
//! one, never a partial view. Mutation is single-writer, many-reader.

pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod writer;

pub use pool::{create_pool, get_pool_stats, DbPool, PoolStats};
pub use repositories::{
    ApiDocumentData, ApiDocumentRepository, CrossReferenceData, CrossReferenceRepository,
    EndpointData, EndpointRepository, SchemaData, SchemaRepository, SecuritySchemeData,
    SecuritySchemeRepository,
};
pub use writer::{commit_document, DocumentCommit};

use crate::errors::{ApiscopeError, Result};
use sqlx::Row;

/// Version of the on-disk layout this build understands. Bumped whenever a
/// migration changes the shape of existing tables.
pub const STORE_VERSION: i64 = 1;

/// Check the persisted store version, writing it on first open. The store
/// refuses to operate when the on-disk version is newer than the code.
pub async fn check_store_version(pool: &DbPool) -> Result<()> {
    let row = sqlx::query("SELECT value FROM store_meta WHERE key = 'store_version'")
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiscopeError::database(e, "Failed to read store version".to_string()))?;

    match row {
        Some(row) => {
            let raw: String = row.get("value");
            let version: i64 = raw.parse().map_err(|_| {
                ApiscopeError::internal(format!("Corrupt store version value '{raw}'"))
            })?;
            if version > STORE_VERSION {
                return Err(ApiscopeError::config(format!(
                    "Store version {version} is newer than this build supports ({STORE_VERSION}); refusing to open"
                )));
            }
            Ok(())
        }
        None => {
            sqlx::query("INSERT INTO store_meta (key, value) VALUES ('store_version', $1)")
                .bind(STORE_VERSION.to_string())
                .execute(pool)
                .await
                .map_err(|e| {
                    ApiscopeError::database(e, "Failed to write store version".to_string())
                })?;
            Ok(())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_version_written_on_first_open() {
        let pool = test_support::memory_pool().await;
        // A second check against the same pool sees the stamped version.
        check_store_version(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_newer_store_version_is_refused() {
        let pool = test_support::memory_pool().await;
        sqlx::query("UPDATE store_meta SET value = $1 WHERE key = 'store_version'")
            .bind((STORE_VERSION + 1).to_string())
            .execute(&pool)
            .await
            .unwrap();

        let err = check_store_version(&pool).await.unwrap_err();
        assert!(err.to_string().contains("refusing to open"));
    }
}
