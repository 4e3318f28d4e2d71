//! Searchable documents
//!
//! Denormalized, field-weighted projections of core records used by the
//! full-text index. One document per endpoint and one per schema; every
//! field is a plain string of space-joined tokens so the index can treat
//! fields uniformly.

use crate::ingest::model::{ParameterLocation, UsageContext};
use crate::search::xref::CrossReferenceMap;
use crate::storage::{EndpointData, SchemaData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

/// English stop words removed from `keywords` fields.
static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in",
        "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "will",
        "with",
    ]
    .into_iter()
    .collect()
});

/// Lowercase and split on non-alphanumeric characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Semantic classification of an endpoint, derived jointly from its method
/// and path shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Read,
    List,
    Update,
    Delete,
    Search,
    Upload,
    Action,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Search => "search",
            Self::Upload => "upload",
            Self::Action => "action",
        }
    }
}

/// Ordinal structural complexity computed from a bounded integer score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "simple" => Some(Self::Simple),
            "moderate" => Some(Self::Moderate),
            "complex" => Some(Self::Complex),
            _ => None,
        }
    }
}

/// The searchable projection of one endpoint record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDocument {
    pub endpoint_id: i64,
    pub endpoint_path: String,
    pub http_method: String,
    pub operation_summary: String,
    pub operation_description: String,
    pub operation_id: String,
    /// Non-parameter path segments joined by space.
    pub path_segments: String,
    pub path_parameters: String,
    pub query_parameters: String,
    pub header_parameters: String,
    pub parameter_names: String,
    pub required_parameters: String,
    pub optional_parameters: String,
    pub parameter_types: String,
    pub parameter_descriptions: String,
    /// Referenced schema names across responses.
    pub response_schemas: String,
    pub status_codes: String,
    pub content_types: String,
    pub security_requirements: String,
    pub tags: String,
    /// First non-parameter path segment.
    pub resource_name: String,
    pub operation_type: OperationType,
    pub keywords: Vec<String>,
    pub searchable_text: String,
    pub deprecated: bool,
    pub has_request_body: bool,
    pub has_examples: bool,
}

/// The searchable projection of one schema record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub schema_id: i64,
    pub schema_name: String,
    pub schema_type: String,
    pub description: String,
    pub property_names: String,
    pub property_descriptions: String,
    pub property_types: String,
    pub required_properties: String,
    pub optional_properties: String,
    /// Names of directly referenced schemas.
    pub nested_schemas: String,
    /// Validation keyword tokens present anywhere in the body.
    pub validation_rules: String,
    /// `METHOD path` keys of endpoints using this schema.
    pub used_in_endpoints: String,
    pub usage_contexts: String,
    pub composition_type: String,
    pub inherits_from: String,
    pub complexity_level: ComplexityLevel,
    pub usage_frequency: u32,
    pub keywords: Vec<String>,
    pub searchable_text: String,
    pub deprecated: bool,
}

/// Weighted repetition factors for `searchable_text`. The ordering is the
/// contract (path > summary > tags > description = parameter descriptions);
/// the integers are this implementation's stable choice.
const WEIGHT_PATH: usize = 4;
const WEIGHT_SUMMARY: usize = 3;
const WEIGHT_TAGS: usize = 2;
const WEIGHT_DESCRIPTION: usize = 1;
const WEIGHT_PARAM_DESCRIPTIONS: usize = 1;

/// Build the searchable document for one endpoint.
pub fn build_endpoint_document(endpoint: &EndpointData) -> EndpointDocument {
    let record = &endpoint.record;

    let segments: Vec<&str> = record
        .path
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .collect();
    let resource_name = segments.first().copied().unwrap_or_default().to_string();

    let mut path_parameters = Vec::new();
    let mut query_parameters = Vec::new();
    let mut header_parameters = Vec::new();
    let mut required_parameters = Vec::new();
    let mut optional_parameters = Vec::new();
    let mut parameter_types = BTreeSet::new();
    let mut parameter_descriptions = Vec::new();
    for param in &record.parameters {
        match param.location {
            ParameterLocation::Path => path_parameters.push(param.name.clone()),
            ParameterLocation::Query => query_parameters.push(param.name.clone()),
            ParameterLocation::Header => header_parameters.push(param.name.clone()),
            ParameterLocation::Cookie => {}
        }
        if param.required {
            required_parameters.push(param.name.clone());
        } else {
            optional_parameters.push(param.name.clone());
        }
        if let Some(kind) = param.schema.as_ref().and_then(|s| s.get("type")).and_then(Value::as_str)
        {
            parameter_types.insert(kind.to_string());
        }
        if let Some(description) = &param.description {
            parameter_descriptions.push(description.clone());
        }
    }
    let parameter_names: Vec<String> =
        record.parameters.iter().map(|p| p.name.clone()).collect();

    let mut response_schemas = BTreeSet::new();
    let mut status_codes = Vec::new();
    let mut content_types = BTreeSet::new();
    for response in &record.responses {
        status_codes.push(response.status.clone());
        for media in &response.content {
            content_types.insert(media.content_type.clone());
            if let Some(schema) = &media.schema {
                for name in crate::ingest::model::scan_refs(schema) {
                    response_schemas.insert(name);
                }
            }
        }
    }
    if let Some(body) = &record.request_body {
        for media in &body.content {
            content_types.insert(media.content_type.clone());
        }
    }

    let security_requirements: Vec<String> =
        record.security.iter().map(|s| s.scheme.clone()).collect();

    let operation_type = derive_operation_type(record);
    let has_examples = record
        .responses
        .iter()
        .flat_map(|r| &r.content)
        .chain(record.request_body.iter().flat_map(|b| &b.content))
        .any(|m| m.example.is_some())
        || record.parameters.iter().any(|p| p.example.is_some());

    let summary = record.summary.clone().unwrap_or_default();
    let description = record.description.clone().unwrap_or_default();
    let tags_joined = record.tags.join(" ");
    let param_descriptions_joined = parameter_descriptions.join(" ");

    let searchable_text = weighted_text(&[
        (&record.path, WEIGHT_PATH),
        (&summary, WEIGHT_SUMMARY),
        (&tags_joined, WEIGHT_TAGS),
        (&description, WEIGHT_DESCRIPTION),
        (&param_descriptions_joined, WEIGHT_PARAM_DESCRIPTIONS),
    ]);

    let keyword_source = format!(
        "{} {} {} {} {} {} {} {} {}",
        record.path,
        record.method,
        summary,
        description,
        tags_joined,
        parameter_names.join(" "),
        response_schemas.iter().cloned().collect::<Vec<_>>().join(" "),
        status_codes.join(" "),
        operation_type.as_str(),
    );

    EndpointDocument {
        endpoint_id: endpoint.id,
        endpoint_path: record.path.clone(),
        http_method: record.method.clone(),
        operation_summary: summary,
        operation_description: description,
        operation_id: record.operation_id.clone().unwrap_or_default(),
        path_segments: segments.join(" "),
        path_parameters: path_parameters.join(" "),
        query_parameters: query_parameters.join(" "),
        header_parameters: header_parameters.join(" "),
        parameter_names: parameter_names.join(" "),
        required_parameters: required_parameters.join(" "),
        optional_parameters: optional_parameters.join(" "),
        parameter_types: parameter_types.into_iter().collect::<Vec<_>>().join(" "),
        parameter_descriptions: param_descriptions_joined,
        response_schemas: response_schemas.into_iter().collect::<Vec<_>>().join(" "),
        status_codes: status_codes.join(" "),
        content_types: content_types.into_iter().collect::<Vec<_>>().join(" "),
        security_requirements: security_requirements.join(" "),
        tags: tags_joined,
        resource_name,
        operation_type,
        keywords: extract_keywords(&keyword_source),
        searchable_text,
        deprecated: record.deprecated,
        has_request_body: record.request_body.is_some(),
        has_examples,
    }
}

/// Build the searchable document for one schema, enriched with usage
/// information from the cross-reference map.
pub fn build_schema_document(schema: &SchemaData, xref: &CrossReferenceMap) -> SchemaDocument {
    let record = &schema.record;
    let body = &record.body;

    let mut property_names = Vec::new();
    let mut property_descriptions = Vec::new();
    let mut property_types = BTreeSet::new();
    if let Some(properties) = body.get("properties").and_then(Value::as_object) {
        for (name, prop) in properties {
            property_names.push(name.clone());
            if let Some(description) = prop.get("description").and_then(Value::as_str) {
                property_descriptions.push(description.to_string());
            }
            if let Some(kind) = prop.get("type").and_then(Value::as_str) {
                property_types.insert(kind.to_string());
            }
        }
    }

    let required: Vec<String> = body
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let optional: Vec<String> =
        property_names.iter().filter(|n| !required.contains(n)).cloned().collect();

    let validation_rules = collect_validation_keywords(body);
    let composition_type = ["allOf", "oneOf", "anyOf", "not"]
        .iter()
        .find(|k| body.get(**k).is_some())
        .map(|k| k.to_string())
        .unwrap_or_default();
    let inherits_from = body
        .get("allOf")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("$ref"))
                .filter_map(Value::as_str)
                .filter_map(crate::ingest::model::ref_schema_name)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let usages = xref.usages_of(&record.name);
    let used_in_endpoints: Vec<String> =
        usages.iter().map(|u| format!("{} {}", u.method, u.path)).collect();
    let usage_contexts: BTreeSet<&'static str> =
        usages.iter().map(|u| u.context.as_str()).collect();
    let usage_frequency = usages.len() as u32;

    let complexity_level = derive_schema_complexity(
        property_names.len(),
        record.dependencies.len(),
        validation_rules.len(),
        !composition_type.is_empty(),
    );

    let description = record.description.clone().unwrap_or_default();
    let searchable_text = weighted_text(&[
        (&record.name, WEIGHT_PATH),
        (&record.title.clone().unwrap_or_default(), WEIGHT_SUMMARY),
        (&property_names.join(" "), WEIGHT_TAGS),
        (&description, WEIGHT_DESCRIPTION),
        (&property_descriptions.join(" "), WEIGHT_PARAM_DESCRIPTIONS),
    ]);

    let keyword_source = format!(
        "{} {} {} {} {}",
        record.name,
        description,
        property_names.join(" "),
        record.dependencies.join(" "),
        record.schema_type.clone().unwrap_or_default(),
    );

    SchemaDocument {
        schema_id: schema.id,
        schema_name: record.name.clone(),
        schema_type: record.schema_type.clone().unwrap_or_default(),
        description,
        property_names: property_names.join(" "),
        property_descriptions: property_descriptions.join(" "),
        property_types: property_types.into_iter().collect::<Vec<_>>().join(" "),
        required_properties: required.join(" "),
        optional_properties: optional.join(" "),
        nested_schemas: record.dependencies.join(" "),
        validation_rules: validation_rules.join(" "),
        used_in_endpoints: used_in_endpoints.join(" "),
        usage_contexts: usage_contexts.into_iter().collect::<Vec<_>>().join(" "),
        composition_type,
        inherits_from,
        complexity_level,
        usage_frequency,
        keywords: extract_keywords(&keyword_source),
        searchable_text,
        deprecated: record.deprecated,
    }
}

/// Operation-type table: method plus path shape, with a summary hint for
/// search and upload detection for POST.
fn derive_operation_type(record: &crate::ingest::model::NormalizedEndpoint) -> OperationType {
    let ends_in_parameter =
        record.path.trim_end_matches('/').split('/').next_back().is_some_and(|s| s.starts_with('{'));
    let text = format!(
        "{} {} {}",
        record.summary.as_deref().unwrap_or_default(),
        record.operation_id.as_deref().unwrap_or_default(),
        record.path
    )
    .to_lowercase();

    match record.method.as_str() {
        "GET" => {
            if ends_in_parameter {
                OperationType::Read
            } else if text.contains("search") {
                OperationType::Search
            } else {
                OperationType::List
            }
        }
        "POST" => {
            let upload_hint = ["upload", "file", "attachment"]
                .iter()
                .any(|hint| text.contains(hint))
                || record
                    .parameters
                    .iter()
                    .any(|p| ["upload", "file", "attachment"].contains(&p.name.as_str()))
                || record.request_body.as_ref().is_some_and(|b| {
                    b.content.iter().any(|m| m.content_type.starts_with("multipart/"))
                });
            if upload_hint {
                OperationType::Upload
            } else {
                OperationType::Create
            }
        }
        "PUT" | "PATCH" => OperationType::Update,
        "DELETE" => OperationType::Delete,
        _ => OperationType::Action,
    }
}

/// Schema complexity score, documented thresholds:
/// - properties: ≥8 → +2, ≥4 → +1
/// - nested references: ≥5 → +2, ≥2 → +1
/// - validation keywords: ≥5 → +1
/// - composition present: +1
///
/// Total 0–1 → simple, 2–3 → moderate, ≥4 → complex.
pub fn derive_schema_complexity(
    property_count: usize,
    nested_ref_count: usize,
    validation_rule_count: usize,
    has_composition: bool,
) -> ComplexityLevel {
    let mut score = 0;
    if property_count >= 8 {
        score += 2;
    } else if property_count >= 4 {
        score += 1;
    }
    if nested_ref_count >= 5 {
        score += 2;
    } else if nested_ref_count >= 2 {
        score += 1;
    }
    if validation_rule_count >= 5 {
        score += 1;
    }
    if has_composition {
        score += 1;
    }

    match score {
        0..=1 => ComplexityLevel::Simple,
        2..=3 => ComplexityLevel::Moderate,
        _ => ComplexityLevel::Complex,
    }
}

/// Endpoint complexity uses the analogous bounded score over structural
/// features: parameters (≥8 → +2, ≥4 → +1), responses (≥4 → +1), request
/// body (+1), referenced schemas (≥3 → +1).
pub fn derive_endpoint_complexity(
    parameter_count: usize,
    response_count: usize,
    has_request_body: bool,
    schema_ref_count: usize,
) -> ComplexityLevel {
    let mut score = 0;
    if parameter_count >= 8 {
        score += 2;
    } else if parameter_count >= 4 {
        score += 1;
    }
    if response_count >= 4 {
        score += 1;
    }
    if has_request_body {
        score += 1;
    }
    if schema_ref_count >= 3 {
        score += 1;
    }

    match score {
        0..=1 => ComplexityLevel::Simple,
        2..=3 => ComplexityLevel::Moderate,
        _ => ComplexityLevel::Complex,
    }
}

const VALIDATION_KEYWORDS: [&str; 12] = [
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "multipleOf",
    "enum",
    "const",
];

fn collect_validation_keywords(body: &Value) -> Vec<String> {
    let mut found = BTreeSet::new();
    collect_validation_inner(body, &mut found);
    found.into_iter().map(str::to_string).collect()
}

fn collect_validation_inner(value: &Value, found: &mut BTreeSet<&'static str>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if let Some(keyword) = VALIDATION_KEYWORDS.iter().find(|k| *k == key) {
                    found.insert(keyword);
                }
                collect_validation_inner(child, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_validation_inner(item, found);
            }
        }
        _ => {}
    }
}

fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn weighted_text(parts: &[(&str, usize)]) -> String {
    let mut out = String::new();
    for (text, weight) in parts {
        if text.is_empty() {
            continue;
        }
        for _ in 0..*weight {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::model::{
        MediaTypeRecord, NormalizedEndpoint, ParameterRecord, RequestBodyRecord, ResponseRecord,
    };
    use serde_json::json;

    fn endpoint(path: &str, method: &str, summary: Option<&str>) -> NormalizedEndpoint {
        NormalizedEndpoint {
            path: path.to_string(),
            method: method.to_string(),
            operation_id: None,
            summary: summary.map(str::to_string),
            description: None,
            tags: vec![],
            parameters: vec![],
            request_body: None,
            responses: vec![],
            security: vec![],
            deprecated: false,
            extensions: vec![],
        }
    }

    #[test]
    fn test_operation_type_table() {
        assert_eq!(
            derive_operation_type(&endpoint("/users/{id}", "GET", None)),
            OperationType::Read
        );
        assert_eq!(derive_operation_type(&endpoint("/users", "GET", None)), OperationType::List);
        assert_eq!(
            derive_operation_type(&endpoint("/users", "GET", Some("Search users by name"))),
            OperationType::Search
        );
        assert_eq!(derive_operation_type(&endpoint("/users", "POST", None)), OperationType::Create);
        assert_eq!(derive_operation_type(&endpoint("/users", "PUT", None)), OperationType::Update);
        assert_eq!(
            derive_operation_type(&endpoint("/users", "PATCH", None)),
            OperationType::Update
        );
        assert_eq!(
            derive_operation_type(&endpoint("/users", "DELETE", None)),
            OperationType::Delete
        );
        assert_eq!(
            derive_operation_type(&endpoint("/users", "OPTIONS", None)),
            OperationType::Action
        );
    }

    #[test]
    fn test_post_upload_hint() {
        let mut ep = endpoint("/documents/upload", "POST", None);
        assert_eq!(derive_operation_type(&ep), OperationType::Upload);

        ep = endpoint("/documents", "POST", None);
        ep.request_body = Some(RequestBodyRecord {
            required: true,
            description: None,
            content: vec![MediaTypeRecord {
                content_type: "multipart/form-data".to_string(),
                schema: None,
                example: None,
            }],
        });
        assert_eq!(derive_operation_type(&ep), OperationType::Upload);
    }

    #[test]
    fn test_schema_complexity_thresholds() {
        assert_eq!(derive_schema_complexity(1, 0, 0, false), ComplexityLevel::Simple);
        assert_eq!(derive_schema_complexity(4, 0, 0, false), ComplexityLevel::Simple);
        assert_eq!(derive_schema_complexity(4, 2, 0, false), ComplexityLevel::Moderate);
        assert_eq!(derive_schema_complexity(8, 2, 0, false), ComplexityLevel::Moderate);
        assert_eq!(derive_schema_complexity(8, 5, 5, true), ComplexityLevel::Complex);
    }

    #[test]
    fn test_tokenize_and_keywords() {
        let tokens = tokenize("/api/v1/Users/{userId}");
        assert_eq!(tokens, vec!["api", "v1", "users", "userid"]);

        let keywords = extract_keywords("List all of the users in the system");
        assert!(keywords.contains(&"users".to_string()));
        assert!(!keywords.contains(&"the".to_string()));
        assert!(!keywords.contains(&"of".to_string()));
    }

    #[test]
    fn test_endpoint_document_fields() {
        let mut record = endpoint("/api/v1/users/{id}", "GET", Some("Get user"));
        record.parameters = vec![
            ParameterRecord {
                name: "id".to_string(),
                location: ParameterLocation::Path,
                required: true,
                schema: Some(json!({"type": "string"})),
                description: Some("User identifier".to_string()),
                example: None,
            },
            ParameterRecord {
                name: "verbose".to_string(),
                location: ParameterLocation::Query,
                required: false,
                schema: Some(json!({"type": "boolean"})),
                description: None,
                example: None,
            },
        ];
        record.responses = vec![ResponseRecord {
            status: "200".to_string(),
            description: None,
            content: vec![MediaTypeRecord {
                content_type: "application/json".to_string(),
                schema: Some(json!({"$ref": "#/components/schemas/User"})),
                example: None,
            }],
        }];

        let document =
            build_endpoint_document(&EndpointData { id: 7, document_id: 1, record });

        assert_eq!(document.endpoint_id, 7);
        assert_eq!(document.resource_name, "api");
        assert_eq!(document.path_segments, "api v1 users");
        assert_eq!(document.path_parameters, "id");
        assert_eq!(document.query_parameters, "verbose");
        assert_eq!(document.required_parameters, "id");
        assert_eq!(document.optional_parameters, "verbose");
        assert_eq!(document.response_schemas, "User");
        assert_eq!(document.status_codes, "200");
        assert_eq!(document.operation_type, OperationType::Read);
        assert!(document.searchable_text.contains("/api/v1/users/{id}"));
        assert!(document.keywords.contains(&"users".to_string()));
    }

    #[test]
    fn test_weighted_text_ordering() {
        // Path tokens must dominate description tokens in frequency.
        let text = weighted_text(&[("users", WEIGHT_PATH), ("something", WEIGHT_DESCRIPTION)]);
        let users = text.matches("users").count();
        let something = text.matches("something").count();
        assert!(users > something);
    }

    #[test]
    fn test_validation_keyword_collection() {
        let body = json!({
            "type": "object",
            "properties": {
                "age": {"type": "integer", "minimum": 0, "maximum": 150},
                "name": {"type": "string", "pattern": "^[a-z]+$"}
            }
        });
        let keywords = collect_validation_keywords(&body);
        assert_eq!(keywords, vec!["maximum", "minimum", "pattern"]);
    }
}
