//! Canonical record model produced by the ingest pipeline.
//!
//! Records are immutable once written: the ingest pipeline builds them, the
//! store persists them, and everything downstream holds read-only views.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Severity of an ingest issue. Structural problems are errors; stylistic
/// problems and circular references are warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A problem found while parsing or normalizing, keyed to a location in the
/// source document (a JSON-pointer-style path, or `byte N line L column C`
/// for syntax errors).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestIssue {
    pub location: String,
    pub message: String,
}

impl IngestIssue {
    pub fn new<L: Into<String>, M: Into<String>>(location: L, message: M) -> Self {
        Self { location: location.into(), message: message.into() }
    }
}

impl fmt::Display for IngestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Counters captured while parsing a specification file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseMetrics {
    pub bytes_read: u64,
    pub duration_ms: u64,
    pub path_count: usize,
    pub schema_count: usize,
    pub security_scheme_count: usize,
}

/// Where a parameter lives in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

/// Canonical request parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// One entry of a request body or response `content` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTypeRecord {
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// Canonical request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBodyRecord {
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: Vec<MediaTypeRecord>,
}

/// Canonical response, keyed by status code (`"200"`, `"default"`, …).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: Vec<MediaTypeRecord>,
}

/// One security requirement on an endpoint: a scheme name plus the scopes
/// requested from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRequirement {
    pub scheme: String,
    pub scopes: Vec<String>,
}

/// Canonical endpoint: one per (path, method) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEndpoint {
    pub path: String,
    /// HTTP method, always upper case.
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub parameters: Vec<ParameterRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyRecord>,
    pub responses: Vec<ResponseRecord>,
    pub security: Vec<SecurityRequirement>,
    pub deprecated: bool,
    /// Vendor extensions (`x-*`), in input order.
    pub extensions: Vec<(String, Value)>,
}

impl NormalizedEndpoint {
    /// Names of all schemas this endpoint references, in first-seen order.
    pub fn schema_dependencies(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut push = |name: String| {
            if seen.insert(name.clone()) {
                out.push(name);
            }
        };

        for param in &self.parameters {
            if let Some(schema) = &param.schema {
                for dep in scan_refs(schema) {
                    push(dep);
                }
            }
        }
        if let Some(body) = &self.request_body {
            for media in &body.content {
                if let Some(schema) = &media.schema {
                    for dep in scan_refs(schema) {
                        push(dep);
                    }
                }
            }
        }
        for response in &self.responses {
            for media in &response.content {
                if let Some(schema) = &media.schema {
                    for dep in scan_refs(schema) {
                        push(dep);
                    }
                }
            }
        }
        out
    }
}

/// Canonical named component schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSchema {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The full schema body with standard keywords, minus top-level `x-*`
    /// keys. Key order is preserved from the source document.
    pub body: Value,
    /// Outbound named-schema references found anywhere in the body.
    pub dependencies: Vec<String>,
    /// Inbound references; filled by the usage sub-pass.
    pub used_by: Vec<String>,
    pub deprecated: bool,
    pub extensions: Vec<(String, Value)>,
}

/// Kind of a security scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecuritySchemeKind {
    ApiKey,
    Http,
    Oauth2,
    OpenIdConnect,
}

impl SecuritySchemeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "apiKey" => Some(Self::ApiKey),
            "http" => Some(Self::Http),
            "oauth2" => Some(Self::Oauth2),
            "openIdConnect" => Some(Self::OpenIdConnect),
            // Swagger 2.0 spells http-basic as its own kind
            "basic" => Some(Self::Http),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "apiKey",
            Self::Http => "http",
            Self::Oauth2 => "oauth2",
            Self::OpenIdConnect => "openIdConnect",
        }
    }
}

/// Canonical security scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySchemeRecord {
    pub name: String,
    pub kind: SecuritySchemeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Kind-specific fields (apiKey location/name, http scheme, oauth2
    /// flows, OIDC URL) exactly as they appeared in the source.
    pub body: Value,
}

/// Context in which an endpoint uses a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageContext {
    RequestBody,
    ResponseBody,
    Parameter,
}

impl UsageContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestBody => "request_body",
            Self::ResponseBody => "response_body",
            Self::Parameter => "parameter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "request_body" => Some(Self::RequestBody),
            "response_body" => Some(Self::ResponseBody),
            "parameter" => Some(Self::Parameter),
            _ => None,
        }
    }
}

/// One edge of the cross-reference map: endpoint (by index into
/// [`NormalizedDocument::endpoints`]) ↔ schema, with context and a
/// contextual-importance score in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaUsage {
    pub endpoint_index: usize,
    pub schema_name: String,
    pub context: UsageContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub required: bool,
    pub score: f64,
}

/// Document-level attributes of one ingested specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub title: String,
    pub version: String,
    pub openapi_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<Value>,
    pub servers: Vec<String>,
    /// SHA-256 of the source bytes, hex encoded. Uniquely identifies the
    /// source file; re-ingesting the same bytes is a no-op.
    pub content_hash: String,
    pub file_path: String,
    pub file_size: u64,
}

/// The finished output of the ingest pipeline for one specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub info: DocumentInfo,
    pub endpoints: Vec<NormalizedEndpoint>,
    pub schemas: Vec<NormalizedSchema>,
    pub security_schemes: Vec<SecuritySchemeRecord>,
    pub usages: Vec<SchemaUsage>,
    pub metrics: ParseMetrics,
    pub errors: Vec<IngestIssue>,
    pub warnings: Vec<IngestIssue>,
}

/// Collect the bare names of every named-schema `$ref` inside `value`, at
/// any depth, in document order.
pub fn scan_refs(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_refs(value, &mut out);
    out
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "$ref" {
                    if let Some(name) = child.as_str().and_then(ref_schema_name) {
                        out.push(name.to_string());
                    }
                } else {
                    collect_refs(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        _ => {}
    }
}

/// Extract the schema name from a `$ref` string, accepting both OpenAPI 3.x
/// (`#/components/schemas/Name`) and Swagger 2.0 (`#/definitions/Name`)
/// pointer shapes. References to non-schema components return `None`.
pub fn ref_schema_name(reference: &str) -> Option<&str> {
    for prefix in ["#/components/schemas/", "#/definitions/", "components/schemas/"] {
        if let Some(rest) = reference.strip_prefix(prefix) {
            if !rest.is_empty() && !rest.contains('/') {
                return Some(rest);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ref_schema_name_shapes() {
        assert_eq!(ref_schema_name("#/components/schemas/User"), Some("User"));
        assert_eq!(ref_schema_name("#/definitions/User"), Some("User"));
        assert_eq!(ref_schema_name("components/schemas/User"), Some("User"));
        assert_eq!(ref_schema_name("#/components/parameters/Page"), None);
        assert_eq!(ref_schema_name("#/components/schemas/"), None);
        assert_eq!(ref_schema_name("http://example.com/schema.json"), None);
    }

    #[test]
    fn test_scan_refs_nested() {
        let body = json!({
            "type": "object",
            "properties": {
                "owner": {"$ref": "#/components/schemas/User"},
                "items": {
                    "type": "array",
                    "items": {"$ref": "#/components/schemas/Item"}
                }
            },
            "allOf": [{"$ref": "#/components/schemas/Base"}]
        });
        let refs = scan_refs(&body);
        assert_eq!(refs, vec!["User", "Item", "Base"]);
    }

    #[test]
    fn test_endpoint_schema_dependencies_deduplicated() {
        let endpoint = NormalizedEndpoint {
            path: "/users".to_string(),
            method: "POST".to_string(),
            operation_id: None,
            summary: None,
            description: None,
            tags: vec![],
            parameters: vec![],
            request_body: Some(RequestBodyRecord {
                required: true,
                description: None,
                content: vec![MediaTypeRecord {
                    content_type: "application/json".to_string(),
                    schema: Some(json!({"$ref": "#/components/schemas/User"})),
                    example: None,
                }],
            }),
            responses: vec![ResponseRecord {
                status: "200".to_string(),
                description: None,
                content: vec![MediaTypeRecord {
                    content_type: "application/json".to_string(),
                    schema: Some(json!({"$ref": "#/components/schemas/User"})),
                    example: None,
                }],
            }],
            security: vec![],
            deprecated: false,
            extensions: vec![],
        };
        assert_eq!(endpoint.schema_dependencies(), vec!["User"]);
    }

    #[test]
    fn test_parameter_location_round_trip() {
        for loc in ["path", "query", "header", "cookie"] {
            assert_eq!(ParameterLocation::parse(loc).unwrap().as_str(), loc);
        }
        assert!(ParameterLocation::parse("body").is_none());
    }

    #[test]
    fn test_security_scheme_kind_accepts_swagger_basic() {
        assert_eq!(SecuritySchemeKind::parse("basic"), Some(SecuritySchemeKind::Http));
        assert!(SecuritySchemeKind::parse("mutualTLS").is_none());
    }
}
