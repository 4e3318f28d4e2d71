//! Bidirectional schema ↔ endpoint cross-reference map
//!
//! Materialized from the `endpoint_schema_refs` rows written at ingest
//! time. The map is dense: every usage the normalizer found has an edge
//! here, with a contextual-importance score in [0, 1].

use crate::ingest::model::UsageContext;
use crate::storage::{CrossReferenceData, EndpointData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One endpoint using a schema, from the schema's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaEndpointUsage {
    pub endpoint_id: i64,
    pub method: String,
    pub path: String,
    pub context: UsageContext,
    pub content_type: Option<String>,
    pub required: bool,
    pub score: f64,
}

/// One schema used by an endpoint, from the endpoint's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSchemaUsage {
    pub schema_name: String,
    pub context: UsageContext,
    pub content_type: Option<String>,
    pub required: bool,
}

/// The bidirectional map.
#[derive(Debug, Clone, Default)]
pub struct CrossReferenceMap {
    schema_to_endpoints: BTreeMap<String, Vec<SchemaEndpointUsage>>,
    endpoint_to_schemas: BTreeMap<i64, Vec<EndpointSchemaUsage>>,
}

impl CrossReferenceMap {
    /// Build the map from stored usage edges plus the endpoint records they
    /// reference.
    pub fn build(references: &[CrossReferenceData], endpoints: &[EndpointData]) -> Self {
        let endpoint_keys: BTreeMap<i64, (&str, &str)> = endpoints
            .iter()
            .map(|e| (e.id, (e.record.method.as_str(), e.record.path.as_str())))
            .collect();

        let mut map = Self::default();
        for reference in references {
            let Some((method, path)) = endpoint_keys.get(&reference.endpoint_id) else {
                continue;
            };

            map.schema_to_endpoints
                .entry(reference.schema_name.clone())
                .or_default()
                .push(SchemaEndpointUsage {
                    endpoint_id: reference.endpoint_id,
                    method: method.to_string(),
                    path: path.to_string(),
                    context: reference.context,
                    content_type: reference.content_type.clone(),
                    required: reference.required,
                    score: reference.score,
                });

            map.endpoint_to_schemas
                .entry(reference.endpoint_id)
                .or_default()
                .push(EndpointSchemaUsage {
                    schema_name: reference.schema_name.clone(),
                    context: reference.context,
                    content_type: reference.content_type.clone(),
                    required: reference.required,
                });
        }

        // Highest-importance usages first; ties broken by endpoint id for
        // deterministic output.
        for usages in map.schema_to_endpoints.values_mut() {
            usages.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.endpoint_id.cmp(&b.endpoint_id))
            });
        }

        map
    }

    /// Endpoints using `schema_name`, highest-importance first.
    pub fn usages_of(&self, schema_name: &str) -> &[SchemaEndpointUsage] {
        self.schema_to_endpoints.get(schema_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Schemas used by `endpoint_id`.
    pub fn schemas_of(&self, endpoint_id: i64) -> &[EndpointSchemaUsage] {
        self.endpoint_to_schemas.get(&endpoint_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of schemas with at least one usage edge.
    pub fn schema_count(&self) -> usize {
        self.schema_to_endpoints.len()
    }
}
