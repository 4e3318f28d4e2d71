//! Consistency validation over the canonical records.
//!
//! Runs after normalization and reference resolution. Violations are
//! aggregated, never thrown: structural problems land in `errors`,
//! stylistic ones in `warnings`.

use crate::ingest::model::{
    IngestIssue, NormalizedEndpoint, NormalizedSchema, ParameterLocation, SecuritySchemeRecord,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

static PATH_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}/]+)\}").expect("path token regex is valid"));

/// Aggregated validation findings.
#[derive(Debug, Default)]
pub struct Report {
    pub errors: Vec<IngestIssue>,
    pub warnings: Vec<IngestIssue>,
}

/// Validate cross-record consistency of a normalized document.
pub fn validate(
    endpoints: &[NormalizedEndpoint],
    schemas: &[NormalizedSchema],
    security_schemes: &[SecuritySchemeRecord],
) -> Report {
    let mut report = Report::default();
    let known_schemes: HashSet<&str> = security_schemes.iter().map(|s| s.name.as_str()).collect();

    for endpoint in endpoints {
        validate_path_parameters(endpoint, &mut report);
        validate_security_requirements(endpoint, &known_schemes, &mut report);
    }

    for schema in schemas {
        validate_schema_shape(schema, &mut report);
    }

    report
}

/// Every `{token}` in the path template must have a matching path parameter,
/// and every path parameter must appear in the template.
fn validate_path_parameters(endpoint: &NormalizedEndpoint, report: &mut Report) {
    let location = format!("/paths/{}/{}", endpoint.path, endpoint.method.to_lowercase());
    let tokens: Vec<&str> = PATH_TOKEN_REGEX
        .captures_iter(&endpoint.path)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();

    let path_params: Vec<&str> = endpoint
        .parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Path)
        .map(|p| p.name.as_str())
        .collect();

    for token in &tokens {
        match endpoint
            .parameters
            .iter()
            .find(|p| p.location == ParameterLocation::Path && p.name == *token)
        {
            None => report.errors.push(IngestIssue::new(
                location.clone(),
                format!("Path template token '{{{token}}}' has no matching path parameter"),
            )),
            Some(param) if !param.required => report.errors.push(IngestIssue::new(
                location.clone(),
                format!("Path parameter '{token}' must be required"),
            )),
            Some(_) => {}
        }
    }

    for name in path_params {
        if !tokens.contains(&name) {
            report.warnings.push(IngestIssue::new(
                location.clone(),
                format!("Path parameter '{name}' does not appear in the path template"),
            ));
        }
    }
}

fn validate_security_requirements(
    endpoint: &NormalizedEndpoint,
    known_schemes: &HashSet<&str>,
    report: &mut Report,
) {
    let location = format!("/paths/{}/{}", endpoint.path, endpoint.method.to_lowercase());
    for requirement in &endpoint.security {
        if !known_schemes.contains(requirement.scheme.as_str()) {
            report.errors.push(IngestIssue::new(
                location.clone(),
                format!("Security requirement references unknown scheme '{}'", requirement.scheme),
            ));
        }
    }
}

fn validate_schema_shape(schema: &NormalizedSchema, report: &mut Report) {
    let location = format!("/components/schemas/{}", schema.name);
    let body = &schema.body;

    let property_names: HashSet<&str> = body
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().map(String::as_str).collect())
        .unwrap_or_default();

    // Required vs defined properties on object schemas.
    if let Some(required) = body.get("required").and_then(Value::as_array) {
        for entry in required.iter().filter_map(Value::as_str) {
            if !property_names.contains(entry) {
                report.warnings.push(IngestIssue::new(
                    location.clone(),
                    format!("Required property '{entry}' is not declared in 'properties'"),
                ));
            }
        }
    }

    // Array schemas need `items`.
    if schema.schema_type.as_deref() == Some("array") && body.get("items").is_none() {
        report.errors.push(IngestIssue::new(
            location.clone(),
            "Array schema is missing 'items'",
        ));
    }

    // A discriminator property must be declared.
    if let Some(discriminator) = body.get("discriminator") {
        let property = discriminator
            .get("propertyName")
            .and_then(Value::as_str)
            .or_else(|| discriminator.as_str());
        if let Some(property) = property {
            if !property_names.contains(property) {
                report.errors.push(IngestIssue::new(
                    location.clone(),
                    format!("Discriminator property '{property}' is not a declared property"),
                ));
            }
        }
    }
}
