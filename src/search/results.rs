//! # Result Processor
//!
//! Pipeline over raw index hits: filter → enrich with metadata → rank →
//! cluster → paginate. Filter errors never drop the whole query; a broken
//! filter is skipped with a warning.

use crate::ingest::model::SecuritySchemeRecord;
use crate::search::documents::{derive_endpoint_complexity, ComplexityLevel, EndpointDocument};
use crate::search::index::{ScoredHit, SearchIndex};
use crate::search::xref::CrossReferenceMap;
use crate::storage::EndpointData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Score multiplier for deprecated endpoints.
const DEPRECATION_PENALTY: f64 = 0.5;

/// Filters applied to raw hits before ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub methods: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub auth_required: Option<bool>,
    pub auth_schemes: Option<Vec<String>>,
    pub complexity: Option<Vec<ComplexityLevel>>,
    pub include_deprecated: bool,
    pub schema_types: Option<Vec<String>>,
    pub min_usage_frequency: Option<u32>,
}

impl SearchFilters {
    /// Parse a filter object. Unknown keys are ignored with a warning;
    /// malformed values skip that one filter with a warning instead of
    /// failing the query.
    pub fn from_value(value: &Value) -> (Self, Vec<String>) {
        let mut filters = Self::default();
        let mut warnings = Vec::new();
        let Some(map) = value.as_object() else {
            if !value.is_null() {
                warnings.push("Filters must be an object; ignored".to_string());
            }
            return (filters, warnings);
        };

        for (key, entry) in map {
            match key.as_str() {
                "methods" => match string_list(entry) {
                    Some(methods) => {
                        filters.methods =
                            Some(methods.iter().map(|m| m.to_uppercase()).collect())
                    }
                    None => warnings.push("Filter 'methods' must be a string array; skipped".to_string()),
                },
                "tags" => match string_list(entry) {
                    Some(tags) => filters.tags = Some(tags),
                    None => warnings.push("Filter 'tags' must be a string array; skipped".to_string()),
                },
                "authentication" => match entry.as_object() {
                    Some(auth) => {
                        if let Some(required) = auth.get("required") {
                            match required.as_bool() {
                                Some(required) => filters.auth_required = Some(required),
                                None => warnings.push(
                                    "Filter 'authentication.required' must be a boolean; skipped"
                                        .to_string(),
                                ),
                            }
                        }
                        if let Some(schemes) = auth.get("schemes") {
                            match string_list(schemes) {
                                Some(schemes) => filters.auth_schemes = Some(schemes),
                                None => warnings.push(
                                    "Filter 'authentication.schemes' must be a string array; skipped"
                                        .to_string(),
                                ),
                            }
                        }
                    }
                    None => warnings
                        .push("Filter 'authentication' must be an object; skipped".to_string()),
                },
                "complexity" => match string_list(entry) {
                    Some(levels) => {
                        let parsed: Vec<ComplexityLevel> = levels
                            .iter()
                            .filter_map(|l| ComplexityLevel::parse(l))
                            .collect();
                        if parsed.len() == levels.len() {
                            filters.complexity = Some(parsed);
                        } else {
                            warnings.push(
                                "Filter 'complexity' accepts simple|moderate|complex; skipped"
                                    .to_string(),
                            );
                        }
                    }
                    None => warnings
                        .push("Filter 'complexity' must be a string array; skipped".to_string()),
                },
                "include_deprecated" => match entry.as_bool() {
                    Some(include) => filters.include_deprecated = include,
                    None => warnings.push(
                        "Filter 'include_deprecated' must be a boolean; skipped".to_string(),
                    ),
                },
                "schema_types" => match string_list(entry) {
                    Some(types) => filters.schema_types = Some(types),
                    None => warnings
                        .push("Filter 'schema_types' must be a string array; skipped".to_string()),
                },
                "min_usage_frequency" => match entry.as_u64() {
                    Some(minimum) => filters.min_usage_frequency = Some(minimum as u32),
                    None => warnings.push(
                        "Filter 'min_usage_frequency' must be a non-negative integer; skipped"
                            .to_string(),
                    ),
                },
                unknown => warnings.push(format!("Unknown filter '{unknown}' ignored")),
            }
        }

        (filters, warnings)
    }

    /// Canonical JSON representation used in cache keys. Serialization of
    /// the struct is field-order stable, so equal filters always produce
    /// equal strings.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    let array = value.as_array()?;
    let mut out = Vec::with_capacity(array.len());
    for entry in array {
        out.push(entry.as_str()?.to_string());
    }
    Some(out)
}

/// Parameter facts attached to each search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub total: usize,
    pub required: usize,
    pub optional: usize,
    pub types: BTreeMap<String, u32>,
    pub has_file_upload: bool,
    pub has_complex_types: bool,
    pub common_names: Vec<String>,
}

/// Authentication facts attached to each search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationInfo {
    pub required: bool,
    pub schemes: Vec<String>,
    pub scopes: Vec<String>,
    pub description: String,
}

/// Response facts attached to each search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub status_codes: Vec<String>,
    pub content_types: Vec<String>,
    pub has_json: bool,
    pub has_binary: bool,
    pub complexity: String,
}

/// One fully enriched search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSearchResult {
    pub endpoint_id: i64,
    pub path: String,
    pub method: String,
    pub summary: String,
    pub description: String,
    pub operation_id: String,
    pub tags: Vec<String>,
    pub operation_type: String,
    pub resource_group: String,
    pub complexity_level: String,
    pub deprecated: bool,
    pub stability: String,
    pub score: f64,
    pub parameter_summary: ParameterSummary,
    pub authentication_info: AuthenticationInfo,
    pub response_info: ResponseInfo,
    /// Schemas this endpoint reads or writes, from the cross-reference map.
    pub schema_usages: Vec<SchemaUsageRef>,
}

/// Compact schema reference on a search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaUsageRef {
    pub schema: String,
    pub context: String,
    pub content_type: Option<String>,
    pub required: bool,
}

/// Result groups; members are endpoint ids only, never duplicated results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchClusters {
    pub by_tag: BTreeMap<String, Vec<i64>>,
    pub by_resource: BTreeMap<String, Vec<i64>>,
    pub by_complexity: BTreeMap<String, Vec<i64>>,
    pub by_method: BTreeMap<String, Vec<i64>>,
    pub by_operation_type: BTreeMap<String, Vec<i64>>,
    pub by_auth: BTreeMap<String, Vec<i64>>,
}

/// Page envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    pub fn new(total: usize, page: usize, per_page: usize) -> Self {
        let total_pages = total.div_ceil(per_page.max(1));
        Self {
            total,
            page,
            per_page,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1 && total > 0,
        }
    }
}

/// Output of the result pipeline, before the service attaches suggestions
/// and metadata.
#[derive(Debug, Clone)]
pub struct ProcessedResults {
    pub results: Vec<EndpointSearchResult>,
    pub pagination: Pagination,
    pub organization: SearchClusters,
}

/// The result processor. Holds the security scheme catalog needed for
/// authentication enrichment and scheme-kind filters.
#[derive(Debug, Clone, Default)]
pub struct ResultProcessor {
    schemes: BTreeMap<String, SecuritySchemeRecord>,
}

impl ResultProcessor {
    pub fn new(schemes: BTreeMap<String, SecuritySchemeRecord>) -> Self {
        Self { schemes }
    }

    /// Run filter → enrich → rank → cluster → paginate over raw hits.
    pub fn process(
        &self,
        hits: &[ScoredHit],
        index: &SearchIndex,
        records: &HashMap<i64, EndpointData>,
        xref: &CrossReferenceMap,
        filters: &SearchFilters,
        page: usize,
        per_page: usize,
    ) -> ProcessedResults {
        let mut enriched: Vec<EndpointSearchResult> = hits
            .iter()
            .filter_map(|hit| {
                let document = index.endpoint_docs.get(hit.doc as usize)?;
                let record = records.get(&document.endpoint_id)?;
                if !self.passes_filters(document, record, filters) {
                    return None;
                }
                Some(self.enrich(document, record, xref, hit.score))
            })
            .collect();

        rank(&mut enriched);
        let organization = cluster(&enriched);

        let pagination = Pagination::new(enriched.len(), page, per_page);
        let start = (page - 1).saturating_mul(per_page);
        let results: Vec<EndpointSearchResult> =
            enriched.into_iter().skip(start).take(per_page).collect();

        ProcessedResults { results, pagination, organization }
    }

    fn passes_filters(
        &self,
        document: &EndpointDocument,
        record: &EndpointData,
        filters: &SearchFilters,
    ) -> bool {
        if document.deprecated && !filters.include_deprecated {
            return false;
        }

        if let Some(methods) = &filters.methods {
            if !methods.iter().any(|m| m == &document.http_method) {
                return false;
            }
        }

        if let Some(tags) = &filters.tags {
            let matched = record
                .record
                .tags
                .iter()
                .any(|tag| tags.iter().any(|wanted| tag.contains(wanted.as_str())));
            if !matched {
                return false;
            }
        }

        if let Some(required) = filters.auth_required {
            if record.record.security.is_empty() == required {
                return false;
            }
        }

        if let Some(wanted_kinds) = &filters.auth_schemes {
            let kinds = self.scheme_kinds(record);
            if !wanted_kinds.iter().any(|wanted| kinds.iter().any(|k| k == wanted)) {
                return false;
            }
        }

        if let Some(levels) = &filters.complexity {
            let level = endpoint_complexity(record);
            if !levels.contains(&level) {
                return false;
            }
        }

        true
    }

    fn scheme_kinds(&self, record: &EndpointData) -> Vec<String> {
        let mut kinds: Vec<String> = record
            .record
            .security
            .iter()
            .filter_map(|req| self.schemes.get(&req.scheme))
            .map(|s| s.kind.as_str().to_string())
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    fn enrich(
        &self,
        document: &EndpointDocument,
        record: &EndpointData,
        xref: &CrossReferenceMap,
        score: f64,
    ) -> EndpointSearchResult {
        let endpoint = &record.record;

        let mut types: BTreeMap<String, u32> = BTreeMap::new();
        for param in &endpoint.parameters {
            let kind = param
                .schema
                .as_ref()
                .and_then(|s| s.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("unspecified");
            *types.entry(kind.to_string()).or_default() += 1;
        }
        let required = endpoint.parameters.iter().filter(|p| p.required).count();
        let has_complex_types = endpoint.parameters.iter().any(|p| {
            p.schema
                .as_ref()
                .is_some_and(|s| s.get("$ref").is_some() || s.get("properties").is_some())
        });
        let parameter_summary = ParameterSummary {
            total: endpoint.parameters.len(),
            required,
            optional: endpoint.parameters.len() - required,
            types,
            has_file_upload: document.operation_type
                == crate::search::documents::OperationType::Upload,
            has_complex_types,
            common_names: endpoint.parameters.iter().take(5).map(|p| p.name.clone()).collect(),
        };

        let scheme_kinds = self.scheme_kinds(record);
        let scopes: Vec<String> = endpoint
            .security
            .iter()
            .flat_map(|req| req.scopes.iter().cloned())
            .collect();
        let description = if endpoint.security.is_empty() {
            "No authentication required".to_string()
        } else {
            let names: Vec<&str> =
                endpoint.security.iter().map(|req| req.scheme.as_str()).collect();
            format!("Requires {}", names.join(" or "))
        };
        let authentication_info = AuthenticationInfo {
            required: !endpoint.security.is_empty(),
            schemes: scheme_kinds,
            scopes,
            description,
        };

        let status_codes: Vec<String> =
            endpoint.responses.iter().map(|r| r.status.clone()).collect();
        let content_types: Vec<String> = document
            .content_types
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let has_json = content_types.iter().any(|c| c.contains("json"));
        let has_binary = content_types
            .iter()
            .any(|c| c.contains("octet-stream") || c.contains("pdf") || c.starts_with("image/"));
        let response_complexity = match status_codes.len() {
            0..=2 => "simple",
            3..=4 => "moderate",
            _ => "complex",
        };
        let response_info = ResponseInfo {
            status_codes,
            content_types,
            has_json,
            has_binary,
            complexity: response_complexity.to_string(),
        };

        let schema_usages: Vec<SchemaUsageRef> = xref
            .schemas_of(record.id)
            .iter()
            .map(|usage| SchemaUsageRef {
                schema: usage.schema_name.clone(),
                context: usage.context.as_str().to_string(),
                content_type: usage.content_type.clone(),
                required: usage.required,
            })
            .collect();

        EndpointSearchResult {
            endpoint_id: record.id,
            path: endpoint.path.clone(),
            method: endpoint.method.clone(),
            summary: endpoint.summary.clone().unwrap_or_default(),
            description: endpoint.description.clone().unwrap_or_default(),
            operation_id: endpoint.operation_id.clone().unwrap_or_default(),
            tags: endpoint.tags.clone(),
            operation_type: document.operation_type.as_str().to_string(),
            resource_group: document.resource_name.clone(),
            complexity_level: endpoint_complexity(record).as_str().to_string(),
            deprecated: endpoint.deprecated,
            stability: if endpoint.deprecated { "deprecated" } else { "stable" }.to_string(),
            score: if endpoint.deprecated { score * DEPRECATION_PENALTY } else { score },
            parameter_summary,
            authentication_info,
            response_info,
            schema_usages,
        }
    }
}

fn endpoint_complexity(record: &EndpointData) -> ComplexityLevel {
    let endpoint = &record.record;
    derive_endpoint_complexity(
        endpoint.parameters.len(),
        endpoint.responses.len(),
        endpoint.request_body.is_some(),
        endpoint.schema_dependencies().len(),
    )
}

/// Final ranking: score descending; ties put deprecated endpoints last,
/// then sort lexicographically on path then method.
fn rank(results: &mut [EndpointSearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.deprecated.cmp(&b.deprecated))
            .then(a.path.cmp(&b.path))
            .then(a.method.cmp(&b.method))
    });
}

/// Group the full result set; members are endpoint ids only.
fn cluster(results: &[EndpointSearchResult]) -> SearchClusters {
    let mut clusters = SearchClusters::default();
    for result in results {
        for tag in &result.tags {
            clusters.by_tag.entry(tag.clone()).or_default().push(result.endpoint_id);
        }
        if !result.resource_group.is_empty() {
            clusters
                .by_resource
                .entry(result.resource_group.clone())
                .or_default()
                .push(result.endpoint_id);
        }
        clusters
            .by_complexity
            .entry(result.complexity_level.clone())
            .or_default()
            .push(result.endpoint_id);
        clusters.by_method.entry(result.method.clone()).or_default().push(result.endpoint_id);
        clusters
            .by_operation_type
            .entry(result.operation_type.clone())
            .or_default()
            .push(result.endpoint_id);
        let auth_key =
            if result.authentication_info.required { "authenticated" } else { "anonymous" };
        clusters.by_auth.entry(auth_key.to_string()).or_default().push(result.endpoint_id);
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filters_from_value_unknown_keys_warn() {
        let (filters, warnings) = SearchFilters::from_value(&json!({
            "methods": ["get", "POST"],
            "nonsense": true
        }));
        assert_eq!(filters.methods, Some(vec!["GET".to_string(), "POST".to_string()]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("nonsense"));
    }

    #[test]
    fn test_filters_bad_value_skips_only_that_filter() {
        let (filters, warnings) = SearchFilters::from_value(&json!({
            "methods": "GET",
            "tags": ["users"]
        }));
        assert!(filters.methods.is_none());
        assert_eq!(filters.tags, Some(vec!["users".to_string()]));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_filters_authentication_block() {
        let (filters, warnings) = SearchFilters::from_value(&json!({
            "authentication": {"required": true, "schemes": ["http"]}
        }));
        assert!(warnings.is_empty());
        assert_eq!(filters.auth_required, Some(true));
        assert_eq!(filters.auth_schemes, Some(vec!["http".to_string()]));
    }

    #[test]
    fn test_filters_canonical_json_differs_by_content() {
        let (a, _) = SearchFilters::from_value(&json!({"methods": ["GET"]}));
        let (b, _) = SearchFilters::from_value(&json!({"methods": ["POST"]}));
        assert_ne!(a.canonical_json(), b.canonical_json());
        let (c, _) = SearchFilters::from_value(&json!({"methods": ["GET"]}));
        assert_eq!(a.canonical_json(), c.canonical_json());
    }

    #[test]
    fn test_pagination_envelope() {
        let page = Pagination::new(45, 2, 20);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_previous);

        let last = Pagination::new(45, 3, 20);
        assert!(!last.has_next);

        let empty = Pagination::new(0, 1, 20);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_previous);
    }

    #[test]
    fn test_rank_orders_deprecated_last_on_ties() {
        let mut results = vec![
            result_stub(1, "/b", "GET", 1.0, true),
            result_stub(2, "/a", "GET", 1.0, false),
            result_stub(3, "/a", "POST", 2.0, false),
        ];
        rank(&mut results);
        assert_eq!(results[0].endpoint_id, 3);
        assert_eq!(results[1].endpoint_id, 2);
        assert_eq!(results[2].endpoint_id, 1);
    }

    fn result_stub(
        id: i64,
        path: &str,
        method: &str,
        score: f64,
        deprecated: bool,
    ) -> EndpointSearchResult {
        EndpointSearchResult {
            endpoint_id: id,
            path: path.to_string(),
            method: method.to_string(),
            summary: String::new(),
            description: String::new(),
            operation_id: String::new(),
            tags: vec!["users".to_string()],
            operation_type: "list".to_string(),
            resource_group: "users".to_string(),
            complexity_level: "simple".to_string(),
            deprecated,
            stability: String::new(),
            score,
            parameter_summary: ParameterSummary {
                total: 0,
                required: 0,
                optional: 0,
                types: BTreeMap::new(),
                has_file_upload: false,
                has_complex_types: false,
                common_names: vec![],
            },
            authentication_info: AuthenticationInfo {
                required: false,
                schemes: vec![],
                scopes: vec![],
                description: String::new(),
            },
            response_info: ResponseInfo {
                status_codes: vec![],
                content_types: vec![],
                has_json: false,
                has_binary: false,
                complexity: "simple".to_string(),
            },
            schema_usages: vec![],
        }
    }

    #[test]
    fn test_cluster_membership_is_ids_only() {
        let results = vec![
            result_stub(1, "/a", "GET", 1.0, false),
            result_stub(2, "/b", "POST", 0.5, false),
        ];
        let clusters = cluster(&results);
        assert_eq!(clusters.by_method.get("GET"), Some(&vec![1]));
        assert_eq!(clusters.by_method.get("POST"), Some(&vec![2]));
        assert_eq!(clusters.by_tag.get("users"), Some(&vec![1, 2]));
        assert_eq!(clusters.by_auth.get("anonymous"), Some(&vec![1, 2]));
    }
}
