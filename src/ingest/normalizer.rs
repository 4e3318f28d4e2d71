//! # Normalization Engine
//!
//! Consumes streamed specification entries and produces the canonical
//! records of the data model. Three passes run as entries arrive (endpoint,
//! schema, security scheme); the finishing sub-passes (reference
//! resolution, usage inversion, consistency validation) run once the parser
//! is done.

use crate::ingest::consistency;
use crate::ingest::model::{
    DocumentInfo, IngestIssue, MediaTypeRecord, NormalizedDocument, NormalizedEndpoint,
    NormalizedSchema, ParameterLocation, ParameterRecord, RequestBodyRecord, ResponseRecord,
    SchemaUsage, SecurityRequirement, SecuritySchemeKind, SecuritySchemeRecord, Severity,
    UsageContext,
};
use crate::ingest::parser::{ParseOutcome, SpecSink};
use crate::ingest::references;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

const HTTP_METHODS: [&str; 8] =
    ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Usage scores by context. Request bodies dominate, responses follow,
/// parameters trail; required usage outranks optional.
const SCORE_REQUEST_BODY_REQUIRED: f64 = 1.0;
const SCORE_REQUEST_BODY_OPTIONAL: f64 = 0.8;
const SCORE_RESPONSE_SUCCESS: f64 = 0.9;
const SCORE_RESPONSE_OTHER: f64 = 0.7;
const SCORE_PARAMETER: f64 = 0.6;

/// Streaming normalizer: implements [`SpecSink`] and accumulates canonical
/// records entry by entry.
pub struct Normalizer {
    file_path: String,
    openapi_version: Option<String>,
    info: Option<Value>,
    servers: Vec<String>,
    swagger_host: Option<String>,
    swagger_base_path: Option<String>,
    swagger_schemes: Vec<String>,
    root_security: Vec<SecurityRequirement>,
    endpoints: Vec<NormalizedEndpoint>,
    schemas: Vec<NormalizedSchema>,
    security_schemes: Vec<SecuritySchemeRecord>,
    seen_operations: HashSet<(String, String)>,
    errors: Vec<IngestIssue>,
    warnings: Vec<IngestIssue>,
}

impl Normalizer {
    pub fn new(path: &Path) -> Self {
        Self {
            file_path: path.display().to_string(),
            openapi_version: None,
            info: None,
            servers: Vec::new(),
            swagger_host: None,
            swagger_base_path: None,
            swagger_schemes: Vec::new(),
            root_security: Vec::new(),
            endpoints: Vec::new(),
            schemas: Vec::new(),
            security_schemes: Vec::new(),
            seen_operations: HashSet::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Run the finishing sub-passes and assemble the document.
    pub fn finish(mut self, outcome: ParseOutcome) -> NormalizedDocument {
        // Reference resolution: classify every outbound reference.
        let classification =
            references::classify(&self.schemas, &self.endpoints);
        self.errors.extend(classification.errors);
        self.warnings.extend(classification.warnings);

        // Usage sub-pass: invert dependency sets into used_by.
        references::fill_used_by(&mut self.schemas);

        // Cross-reference map, materialized dense at ingest time.
        let usages = build_usages(&self.endpoints);

        // Consistency validation.
        let report = consistency::validate(&self.endpoints, &self.schemas, &self.security_schemes);
        self.errors.extend(report.errors);
        self.warnings.extend(report.warnings);

        let info = self.document_info(&outcome);
        debug!(
            endpoints = self.endpoints.len(),
            schemas = self.schemas.len(),
            errors = self.errors.len(),
            warnings = self.warnings.len(),
            "Normalization finished"
        );

        NormalizedDocument {
            info,
            endpoints: self.endpoints,
            schemas: self.schemas,
            security_schemes: self.security_schemes,
            usages,
            metrics: outcome.metrics,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn document_info(&self, outcome: &ParseOutcome) -> DocumentInfo {
        let info = self.info.as_ref();
        let get = |key: &str| {
            info.and_then(|v| v.get(key)).and_then(Value::as_str).map(str::to_string)
        };

        let mut servers = self.servers.clone();
        if servers.is_empty() {
            if let Some(host) = &self.swagger_host {
                let scheme = self
                    .swagger_schemes
                    .first()
                    .map(String::as_str)
                    .unwrap_or("https");
                let base = self.swagger_base_path.as_deref().unwrap_or("");
                servers.push(format!("{}://{}{}", scheme, host, base));
            }
        }

        DocumentInfo {
            title: get("title").unwrap_or_else(|| "Untitled API".to_string()),
            version: get("version").unwrap_or_else(|| "0.0.0".to_string()),
            openapi_version: self.openapi_version.clone().unwrap_or_else(|| "unknown".to_string()),
            description: get("description"),
            base_url: servers.first().cloned(),
            contact: info.and_then(|v| v.get("contact")).cloned(),
            license: info.and_then(|v| v.get("license")).cloned(),
            servers,
            content_hash: outcome.content_hash.clone(),
            file_path: self.file_path.clone(),
            file_size: outcome.file_size,
        }
    }

    /// Endpoint pass for one `paths` entry: create an Endpoint per method,
    /// merging path-level parameters into each operation.
    fn normalize_path_item(&mut self, path: String, item: Value) {
        let Value::Object(item) = item else {
            self.errors.push(IngestIssue::new(
                format!("/paths/{path}"),
                "Path item must be an object",
            ));
            return;
        };

        let path_level_params = item
            .get("parameters")
            .map(|v| self.normalize_parameters(v, &format!("/paths/{path}/parameters")))
            .unwrap_or_default();

        for (key, operation) in &item {
            if !HTTP_METHODS.contains(&key.as_str()) {
                continue;
            }
            let method = key.to_uppercase();
            let location = format!("/paths/{path}/{key}");
            let Value::Object(op) = operation else {
                self.errors.push(IngestIssue::new(location, "Operation must be an object"));
                continue;
            };

            if !self.seen_operations.insert((path.clone(), method.clone())) {
                self.errors.push(IngestIssue::new(
                    location,
                    format!("Duplicate operation {method} {path}"),
                ));
                continue;
            }

            let op_params = op
                .get("parameters")
                .map(|v| self.normalize_parameters(v, &format!("{location}/parameters")))
                .unwrap_or_default();
            let parameters = merge_parameters(&path_level_params, op_params);

            let request_body = op
                .get("requestBody")
                .and_then(|v| self.normalize_request_body(v, &location));

            let responses = op
                .get("responses")
                .map(|v| self.normalize_responses(v, &location))
                .unwrap_or_default();

            let security = match op.get("security") {
                Some(value) => self.normalize_security_requirements(value, &location),
                None => self.root_security.clone(),
            };

            let extensions = extract_extensions(op);

            self.endpoints.push(NormalizedEndpoint {
                path: path.clone(),
                method,
                operation_id: str_field(op, "operationId"),
                summary: str_field(op, "summary"),
                description: str_field(op, "description"),
                tags: op
                    .get("tags")
                    .and_then(Value::as_array)
                    .map(|tags| {
                        tags.iter().filter_map(Value::as_str).map(str::to_string).collect()
                    })
                    .unwrap_or_default(),
                parameters,
                request_body,
                responses,
                security,
                deprecated: op.get("deprecated").and_then(Value::as_bool).unwrap_or(false),
                extensions,
            });
        }
    }

    fn normalize_parameters(&mut self, value: &Value, location: &str) -> Vec<ParameterRecord> {
        let Some(items) = value.as_array() else {
            self.errors.push(IngestIssue::new(location, "'parameters' must be an array"));
            return Vec::new();
        };

        let mut out = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let entry_location = format!("{location}/{i}");
            let Value::Object(param) = item else {
                self.errors.push(IngestIssue::new(entry_location, "Parameter must be an object"));
                continue;
            };

            if param.contains_key("$ref") {
                self.warnings.push(IngestIssue::new(
                    entry_location,
                    "Parameter references are not inlined; parameter skipped",
                ));
                continue;
            }

            let Some(name) = param.get("name").and_then(Value::as_str) else {
                self.errors.push(IngestIssue::new(entry_location, "Parameter is missing 'name'"));
                continue;
            };
            let Some(raw_location) = param.get("in").and_then(Value::as_str) else {
                self.errors.push(IngestIssue::new(entry_location, "Parameter is missing 'in'"));
                continue;
            };
            // Swagger 2.0 body/formData parameters become the request body
            // in 3.x; treat body as a request-body equivalent here.
            let Some(parameter_location) = ParameterLocation::parse(raw_location) else {
                if raw_location == "body" || raw_location == "formData" {
                    self.warnings.push(IngestIssue::new(
                        entry_location,
                        format!("Legacy '{raw_location}' parameter treated as request body"),
                    ));
                } else {
                    self.errors.push(IngestIssue::new(
                        entry_location,
                        format!("Unknown parameter location '{raw_location}'"),
                    ));
                }
                continue;
            };

            let required = param.get("required").and_then(Value::as_bool).unwrap_or(false)
                || parameter_location == ParameterLocation::Path;

            out.push(ParameterRecord {
                name: name.to_string(),
                location: parameter_location,
                required,
                schema: param.get("schema").cloned().or_else(|| {
                    // Swagger 2.0 puts type/format inline on the parameter.
                    param.get("type").map(|t| {
                        let mut schema = serde_json::Map::new();
                        schema.insert("type".to_string(), t.clone());
                        if let Some(format) = param.get("format") {
                            schema.insert("format".to_string(), format.clone());
                        }
                        Value::Object(schema)
                    })
                }),
                description: param.get("description").and_then(Value::as_str).map(str::to_string),
                example: param.get("example").cloned(),
            });
        }
        out
    }

    fn normalize_request_body(&mut self, value: &Value, location: &str) -> Option<RequestBodyRecord> {
        let Value::Object(body) = value else {
            self.errors.push(IngestIssue::new(
                format!("{location}/requestBody"),
                "'requestBody' must be an object",
            ));
            return None;
        };

        Some(RequestBodyRecord {
            required: body.get("required").and_then(Value::as_bool).unwrap_or(false),
            description: body.get("description").and_then(Value::as_str).map(str::to_string),
            content: self.normalize_content(body.get("content"), location),
        })
    }

    fn normalize_responses(&mut self, value: &Value, location: &str) -> Vec<ResponseRecord> {
        let Value::Object(responses) = value else {
            self.errors.push(IngestIssue::new(
                format!("{location}/responses"),
                "'responses' must be an object",
            ));
            return Vec::new();
        };

        let mut out = Vec::new();
        for (status, response) in responses {
            let Value::Object(response) = response else {
                self.warnings.push(IngestIssue::new(
                    format!("{location}/responses/{status}"),
                    "Response must be an object",
                ));
                continue;
            };

            // Swagger 2.0 carries the schema directly; 3.x nests it in content.
            let content = if response.contains_key("content") {
                self.normalize_content(response.get("content"), location)
            } else if let Some(schema) = response.get("schema") {
                vec![MediaTypeRecord {
                    content_type: "application/json".to_string(),
                    schema: Some(schema.clone()),
                    example: None,
                }]
            } else {
                Vec::new()
            };

            out.push(ResponseRecord {
                status: status.clone(),
                description: response.get("description").and_then(Value::as_str).map(str::to_string),
                content,
            });
        }
        out
    }

    fn normalize_content(&mut self, value: Option<&Value>, location: &str) -> Vec<MediaTypeRecord> {
        let Some(value) = value else {
            return Vec::new();
        };
        let Value::Object(content) = value else {
            self.errors
                .push(IngestIssue::new(format!("{location}/content"), "'content' must be an object"));
            return Vec::new();
        };

        content
            .iter()
            .map(|(content_type, media)| MediaTypeRecord {
                content_type: content_type.clone(),
                schema: media.get("schema").cloned(),
                example: media.get("example").or_else(|| media.get("examples")).cloned(),
            })
            .collect()
    }

    fn normalize_security_requirements(
        &mut self,
        value: &Value,
        location: &str,
    ) -> Vec<SecurityRequirement> {
        let Some(entries) = value.as_array() else {
            self.warnings
                .push(IngestIssue::new(format!("{location}/security"), "'security' must be an array"));
            return Vec::new();
        };

        let mut out = Vec::new();
        for entry in entries {
            let Value::Object(requirement) = entry else {
                continue;
            };
            for (scheme, scopes) in requirement {
                out.push(SecurityRequirement {
                    scheme: scheme.clone(),
                    scopes: scopes
                        .as_array()
                        .map(|s| s.iter().filter_map(Value::as_str).map(str::to_string).collect())
                        .unwrap_or_default(),
                });
            }
        }
        out
    }

    /// Schema pass for one named component schema.
    fn normalize_schema(&mut self, name: String, body: Value) {
        let Value::Object(mut map) = body else {
            self.errors.push(IngestIssue::new(
                format!("/components/schemas/{name}"),
                "Schema must be an object",
            ));
            return;
        };

        let extensions: Vec<(String, Value)> = {
            let keys: Vec<String> =
                map.keys().filter(|k| k.starts_with("x-")).cloned().collect();
            keys.into_iter().filter_map(|k| map.shift_remove(&k).map(|v| (k, v))).collect()
        };

        let body = Value::Object(map);
        let dependencies = dedup(crate::ingest::model::scan_refs(&body));

        self.schemas.push(NormalizedSchema {
            schema_type: body.get("type").and_then(Value::as_str).map(str::to_string),
            title: body.get("title").and_then(Value::as_str).map(str::to_string),
            description: body.get("description").and_then(Value::as_str).map(str::to_string),
            deprecated: body.get("deprecated").and_then(Value::as_bool).unwrap_or(false),
            used_by: Vec::new(),
            name,
            body,
            dependencies,
            extensions,
        });
    }

    /// Security pass for one named scheme.
    fn normalize_security_scheme(&mut self, name: String, body: Value) {
        let Value::Object(ref map) = body else {
            self.errors.push(IngestIssue::new(
                format!("/components/securitySchemes/{name}"),
                "Security scheme must be an object",
            ));
            return;
        };

        let Some(raw_kind) = map.get("type").and_then(Value::as_str) else {
            self.errors.push(IngestIssue::new(
                format!("/components/securitySchemes/{name}"),
                "Security scheme is missing 'type'",
            ));
            return;
        };

        let Some(kind) = SecuritySchemeKind::parse(raw_kind) else {
            self.warnings.push(IngestIssue::new(
                format!("/components/securitySchemes/{name}"),
                format!("Unsupported security scheme type '{raw_kind}'"),
            ));
            return;
        };

        self.security_schemes.push(SecuritySchemeRecord {
            description: map.get("description").and_then(Value::as_str).map(str::to_string),
            name,
            kind,
            body,
        });
    }
}

impl SpecSink for Normalizer {
    fn envelope_version(&mut self, version: String) {
        self.openapi_version = Some(version);
    }

    fn info(&mut self, info: Value) {
        self.info = Some(info);
    }

    fn servers(&mut self, servers: Value) {
        if let Some(entries) = servers.as_array() {
            self.servers = entries
                .iter()
                .filter_map(|s| s.get("url"))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
    }

    fn swagger_host_field(&mut self, key: &str, value: Value) {
        match key {
            "host" => self.swagger_host = value.as_str().map(str::to_string),
            "basePath" => self.swagger_base_path = value.as_str().map(str::to_string),
            "schemes" => {
                if let Some(schemes) = value.as_array() {
                    self.swagger_schemes =
                        schemes.iter().filter_map(Value::as_str).map(str::to_string).collect();
                }
            }
            _ => {}
        }
    }

    fn root_security(&mut self, security: Value) {
        self.root_security = self.normalize_security_requirements(&security, "");
    }

    fn path_item(&mut self, path: String, item: Value) {
        self.normalize_path_item(path, item);
    }

    fn named_schema(&mut self, name: String, body: Value) {
        self.normalize_schema(name, body);
    }

    fn security_scheme(&mut self, name: String, body: Value) {
        self.normalize_security_scheme(name, body);
    }

    fn extension(&mut self, _key: String, _value: Value) {
        // Document-level vendor extensions are not part of the model.
    }

    fn issue(&mut self, severity: Severity, issue: IngestIssue) {
        match severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
        }
    }
}

/// Merge path-level parameters into an operation's list. The operation wins
/// when name and location match.
fn merge_parameters(
    path_level: &[ParameterRecord],
    operation: Vec<ParameterRecord>,
) -> Vec<ParameterRecord> {
    let mut merged = operation;
    for param in path_level {
        let overridden = merged
            .iter()
            .any(|p| p.name == param.name && p.location == param.location);
        if !overridden {
            merged.push(param.clone());
        }
    }
    merged
}

/// Build the dense cross-reference map from the endpoint records.
fn build_usages(endpoints: &[NormalizedEndpoint]) -> Vec<SchemaUsage> {
    let mut usages = Vec::new();

    for (index, endpoint) in endpoints.iter().enumerate() {
        if let Some(body) = &endpoint.request_body {
            for media in &body.content {
                if let Some(schema) = &media.schema {
                    for name in crate::ingest::model::scan_refs(schema) {
                        usages.push(SchemaUsage {
                            endpoint_index: index,
                            schema_name: name,
                            context: UsageContext::RequestBody,
                            content_type: Some(media.content_type.clone()),
                            required: body.required,
                            score: if body.required {
                                SCORE_REQUEST_BODY_REQUIRED
                            } else {
                                SCORE_REQUEST_BODY_OPTIONAL
                            },
                        });
                    }
                }
            }
        }

        for response in &endpoint.responses {
            let success = response.status.starts_with('2');
            for media in &response.content {
                if let Some(schema) = &media.schema {
                    for name in crate::ingest::model::scan_refs(schema) {
                        usages.push(SchemaUsage {
                            endpoint_index: index,
                            schema_name: name,
                            context: UsageContext::ResponseBody,
                            content_type: Some(media.content_type.clone()),
                            required: false,
                            score: if success { SCORE_RESPONSE_SUCCESS } else { SCORE_RESPONSE_OTHER },
                        });
                    }
                }
            }
        }

        for param in &endpoint.parameters {
            if let Some(schema) = &param.schema {
                for name in crate::ingest::model::scan_refs(schema) {
                    usages.push(SchemaUsage {
                        endpoint_index: index,
                        schema_name: name,
                        context: UsageContext::Parameter,
                        content_type: None,
                        required: param.required,
                        score: SCORE_PARAMETER,
                    });
                }
            }
        }
    }

    usages
}

fn extract_extensions(map: &serde_json::Map<String, Value>) -> Vec<(String, Value)> {
    map.iter()
        .filter(|(k, _)| k.starts_with("x-"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn str_field(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names.into_iter().filter(|n| seen.insert(n.clone())).collect()
}
