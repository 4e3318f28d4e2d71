//! # Code-Example Generator
//!
//! Emits runnable curl / JavaScript / Python snippets for an endpoint. Path
//! parameters become illustrative placeholders (`EXAMPLE_VALUE` for
//! strings, `12345` for numbers), headers always carry `Accept:
//! application/json`, and the request-body placeholder is derived from the
//! referenced schema when it is a flat object of scalar properties.
//! Snippets are deterministic for a fixed (endpoint, options) pair.

use crate::errors::{ApiscopeError, Result};
use crate::ingest::model::{
    NormalizedEndpoint, ParameterLocation, SecuritySchemeKind, SecuritySchemeRecord,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Placeholder for string-typed path parameters.
const STRING_PLACEHOLDER: &str = "EXAMPLE_VALUE";
/// Placeholder for numeric path parameters.
const NUMBER_PLACEHOLDER: &str = "12345";
const BEARER_PLACEHOLDER: &str = "YOUR_TOKEN_HERE";
const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

/// Supported snippet formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleFormat {
    Curl,
    Javascript,
    Python,
}

impl ExampleFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "curl" => Some(Self::Curl),
            "javascript" => Some(Self::Javascript),
            "python" => Some(Self::Python),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Curl => "curl",
            Self::Javascript => "javascript",
            Self::Python => "python",
        }
    }
}

/// Options for one generation call.
#[derive(Debug, Clone)]
pub struct ExampleOptions {
    pub format: ExampleFormat,
    pub include_auth: bool,
    /// Overrides the document base URL when set.
    pub base_url: Option<String>,
}

/// Inputs resolved by the caller: the endpoint, the security schemes it may
/// reference, and the schema catalog for body placeholders.
pub struct ExampleContext<'a> {
    pub endpoint: &'a NormalizedEndpoint,
    pub document_base_url: Option<&'a str>,
    pub schemes: &'a BTreeMap<String, SecuritySchemeRecord>,
    pub schemas: &'a BTreeMap<String, Value>,
}

/// Generate a snippet for the endpoint in the requested format.
pub fn generate_example(context: &ExampleContext<'_>, options: &ExampleOptions) -> Result<String> {
    let endpoint = context.endpoint;
    let url = build_url(context, options);
    let headers = build_headers(context, options);
    let body = body_placeholder(context);

    let snippet = match options.format {
        ExampleFormat::Curl => render_curl(endpoint, &url, &headers, body.as_ref()),
        ExampleFormat::Javascript => render_javascript(endpoint, &url, &headers, body.as_ref()),
        ExampleFormat::Python => render_python(endpoint, &url, &headers, body.as_ref()),
    };

    snippet.map_err(|e| {
        ApiscopeError::code_generation(
            format!("{} {}", endpoint.method, endpoint.path),
            options.format.as_str(),
            e.to_string(),
        )
    })
}

fn build_url(context: &ExampleContext<'_>, options: &ExampleOptions) -> String {
    let base = options
        .base_url
        .as_deref()
        .or(context.document_base_url)
        .unwrap_or("https://api.example.com")
        .trim_end_matches('/')
        .to_string();

    let mut path = context.endpoint.path.clone();
    for param in &context.endpoint.parameters {
        if param.location != ParameterLocation::Path {
            continue;
        }
        let token = format!("{{{}}}", param.name);
        path = path.replace(&token, path_placeholder(param.schema.as_ref()));
    }
    // Tokens without a declared parameter still get the string placeholder.
    while let (Some(start), Some(end)) = (path.find('{'), path.find('}')) {
        if end < start {
            break;
        }
        path.replace_range(start..=end, STRING_PLACEHOLDER);
    }

    let mut url = format!("{base}{path}");

    let required_query: Vec<&crate::ingest::model::ParameterRecord> = context
        .endpoint
        .parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Query && p.required)
        .collect();
    for (i, param) in required_query.iter().enumerate() {
        let separator = if i == 0 { '?' } else { '&' };
        let _ = write!(url, "{separator}{}={}", param.name, path_placeholder(param.schema.as_ref()));
    }

    url
}

fn path_placeholder(schema: Option<&Value>) -> &'static str {
    match schema.and_then(|s| s.get("type")).and_then(Value::as_str) {
        Some("integer") | Some("number") => NUMBER_PLACEHOLDER,
        _ => STRING_PLACEHOLDER,
    }
}

fn build_headers(context: &ExampleContext<'_>, options: &ExampleOptions) -> Vec<(String, String)> {
    let mut headers = vec![("Accept".to_string(), "application/json".to_string())];

    if context.endpoint.request_body.is_some() {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }

    if options.include_auth {
        if let Some(requirement) = context.endpoint.security.first() {
            match context.schemes.get(&requirement.scheme) {
                Some(scheme) => match auth_header(scheme) {
                    Some(header) => headers.push(header),
                    None => headers.push((
                        format!("# authentication: {}", scheme.kind.as_str()),
                        String::new(),
                    )),
                },
                None => headers
                    .push((format!("# authentication: {}", requirement.scheme), String::new())),
            }
        }
    }

    headers
}

fn auth_header(scheme: &SecuritySchemeRecord) -> Option<(String, String)> {
    match scheme.kind {
        SecuritySchemeKind::Http => {
            let http_scheme =
                scheme.body.get("scheme").and_then(Value::as_str).unwrap_or("bearer");
            if http_scheme.eq_ignore_ascii_case("bearer") {
                Some(("Authorization".to_string(), format!("Bearer {BEARER_PLACEHOLDER}")))
            } else {
                None
            }
        }
        SecuritySchemeKind::ApiKey => {
            let location = scheme.body.get("in").and_then(Value::as_str).unwrap_or("header");
            if location == "header" {
                let name = scheme
                    .body
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("X-API-Key");
                Some((name.to_string(), API_KEY_PLACEHOLDER.to_string()))
            } else {
                None
            }
        }
        SecuritySchemeKind::Oauth2 | SecuritySchemeKind::OpenIdConnect => None,
    }
}

/// Derive a JSON body placeholder from the request-body schema. Flat object
/// schemas with scalar properties produce one field per property; anything
/// else falls back to `{"data": "example_value"}`.
fn body_placeholder(context: &ExampleContext<'_>) -> Option<Value> {
    let body = context.endpoint.request_body.as_ref()?;
    let schema = body
        .content
        .iter()
        .find(|m| m.content_type.contains("json"))
        .or_else(|| body.content.first())
        .and_then(|m| m.schema.as_ref())?;

    let resolved = match schema.get("$ref").and_then(Value::as_str) {
        Some(reference) => crate::ingest::model::ref_schema_name(reference)
            .and_then(|name| context.schemas.get(name)),
        None => Some(schema),
    };

    Some(resolved.and_then(simple_object_placeholder).unwrap_or_else(fallback_body))
}

fn simple_object_placeholder(schema: &Value) -> Option<Value> {
    let properties = schema.get("properties")?.as_object()?;
    if properties.is_empty() || properties.len() > 8 {
        return None;
    }

    let mut out = Map::new();
    for (name, prop) in properties {
        let value = match prop.get("type").and_then(Value::as_str) {
            Some("string") => Value::String("example_value".to_string()),
            Some("integer") => Value::from(12345),
            Some("number") => Value::from(123.45),
            Some("boolean") => Value::Bool(true),
            _ => return None,
        };
        out.insert(name.clone(), value);
    }
    Some(Value::Object(out))
}

fn fallback_body() -> Value {
    let mut map = Map::new();
    map.insert("data".to_string(), Value::String("example_value".to_string()));
    Value::Object(map)
}

fn render_curl(
    endpoint: &NormalizedEndpoint,
    url: &str,
    headers: &[(String, String)],
    body: Option<&Value>,
) -> std::result::Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "curl -X {} \"{}\" \\", endpoint.method, url)?;
    for (name, value) in headers {
        if name.starts_with('#') {
            writeln!(out, "  {} \\", name)?;
        } else {
            writeln!(out, "  -H \"{}: {}\" \\", name, value)?;
        }
    }
    match body {
        Some(body) => {
            writeln!(out, "  -d '{}'", serde_json::to_string(body).map_err(|_| std::fmt::Error)?)?
        }
        None => {
            // Remove the trailing continuation from the last header line.
            let trimmed = out.trim_end_matches(" \\\n").to_string();
            out = trimmed;
            out.push('\n');
        }
    }
    Ok(out)
}

fn render_javascript(
    endpoint: &NormalizedEndpoint,
    url: &str,
    headers: &[(String, String)],
    body: Option<&Value>,
) -> std::result::Result<String, std::fmt::Error> {
    let function_name = js_function_name(endpoint);
    let mut out = String::new();
    writeln!(out, "async function {function_name}() {{")?;
    writeln!(out, "  const response = await fetch(\"{url}\", {{")?;
    writeln!(out, "    method: \"{}\",", endpoint.method)?;
    writeln!(out, "    headers: {{")?;
    for (name, value) in headers {
        if name.starts_with('#') {
            writeln!(out, "      // {}", name.trim_start_matches("# "))?;
        } else {
            writeln!(out, "      \"{}\": \"{}\",", name, value)?;
        }
    }
    writeln!(out, "    }},")?;
    if let Some(body) = body {
        writeln!(
            out,
            "    body: JSON.stringify({}),",
            serde_json::to_string(body).map_err(|_| std::fmt::Error)?
        )?;
    }
    writeln!(out, "  }});")?;
    writeln!(out, "  if (!response.ok) {{")?;
    writeln!(out, "    throw new Error(`Request failed: ${{response.status}}`);")?;
    writeln!(out, "  }}")?;
    writeln!(out, "  return response.json();")?;
    writeln!(out, "}}")?;
    Ok(out)
}

fn render_python(
    endpoint: &NormalizedEndpoint,
    url: &str,
    headers: &[(String, String)],
    body: Option<&Value>,
) -> std::result::Result<String, std::fmt::Error> {
    let function_name = python_function_name(endpoint);
    let mut out = String::new();
    writeln!(out, "import requests")?;
    writeln!(out)?;
    writeln!(out)?;
    writeln!(out, "def {function_name}():")?;
    writeln!(out, "    url = \"{url}\"")?;
    writeln!(out, "    headers = {{")?;
    for (name, value) in headers {
        if name.starts_with('#') {
            writeln!(out, "        {}", name)?;
        } else {
            writeln!(out, "        \"{}\": \"{}\",", name, value)?;
        }
    }
    writeln!(out, "    }}")?;
    match body {
        Some(body) => {
            writeln!(
                out,
                "    payload = {}",
                python_literal(body).map_err(|_| std::fmt::Error)?
            )?;
            writeln!(
                out,
                "    response = requests.{}(url, headers=headers, json=payload)",
                endpoint.method.to_lowercase()
            )?;
        }
        None => {
            writeln!(
                out,
                "    response = requests.{}(url, headers=headers)",
                endpoint.method.to_lowercase()
            )?;
        }
    }
    writeln!(out, "    response.raise_for_status()")?;
    writeln!(out, "    return response.json()")?;
    Ok(out)
}

fn js_function_name(endpoint: &NormalizedEndpoint) -> String {
    if let Some(operation_id) = &endpoint.operation_id {
        let sanitized: String =
            operation_id.chars().filter(|c| c.is_alphanumeric() || *c == '_').collect();
        if sanitized.chars().next().is_some_and(|first| !first.is_numeric()) {
            return sanitized;
        }
    }
    let resource: String = endpoint
        .path
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .next_back()
        .unwrap_or("resource")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    format!("{}{}", endpoint.method.to_lowercase(), capitalize(&resource))
}

fn python_function_name(endpoint: &NormalizedEndpoint) -> String {
    let js = js_function_name(endpoint);
    // camelCase → snake_case
    let mut out = String::new();
    for c in js.chars() {
        if c.is_uppercase() {
            out.push('_');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out.trim_start_matches('_').to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Python literals differ from JSON for booleans and null.
fn python_literal(value: &Value) -> serde_json::Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(json.replace(":true", ":True").replace(":false", ":False").replace(":null", ":None"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::model::{
        MediaTypeRecord, ParameterRecord, RequestBodyRecord, SecurityRequirement,
    };
    use serde_json::json;

    fn bearer_schemes() -> BTreeMap<String, SecuritySchemeRecord> {
        let mut schemes = BTreeMap::new();
        schemes.insert(
            "bearerAuth".to_string(),
            SecuritySchemeRecord {
                name: "bearerAuth".to_string(),
                kind: SecuritySchemeKind::Http,
                description: None,
                body: json!({"type": "http", "scheme": "bearer"}),
            },
        );
        schemes
    }

    fn post_users() -> NormalizedEndpoint {
        NormalizedEndpoint {
            path: "/api/v1/users".to_string(),
            method: "POST".to_string(),
            operation_id: Some("createUser".to_string()),
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
            responses: vec![],
            security: vec![SecurityRequirement { scheme: "bearerAuth".to_string(), scopes: vec![] }],
            deprecated: false,
            extensions: vec![],
        }
    }

    fn schemas() -> BTreeMap<String, Value> {
        let mut schemas = BTreeMap::new();
        schemas.insert(
            "User".to_string(),
            json!({
                "type": "object",
                "properties": {"email": {"type": "string"}, "age": {"type": "integer"}}
            }),
        );
        schemas
    }

    #[test]
    fn test_curl_with_auth_and_body() {
        let endpoint = post_users();
        let schemes = bearer_schemes();
        let schemas = schemas();
        let context = ExampleContext {
            endpoint: &endpoint,
            document_base_url: Some("https://api.example.com"),
            schemes: &schemes,
            schemas: &schemas,
        };
        let snippet = generate_example(
            &context,
            &ExampleOptions { format: ExampleFormat::Curl, include_auth: true, base_url: None },
        )
        .unwrap();

        assert!(snippet.contains("curl -X POST"));
        assert!(snippet.contains("https://api.example.com/api/v1/users"));
        assert!(snippet.contains("Authorization: Bearer YOUR_TOKEN_HERE"));
        assert!(snippet.contains("Content-Type: application/json"));
        assert!(snippet.contains("Accept: application/json"));
        assert!(snippet.contains("-d '{"));
        assert!(snippet.contains("\"email\":\"example_value\""));
        assert!(snippet.contains("\"age\":12345"));
    }

    #[test]
    fn test_path_and_query_placeholders() {
        let endpoint = NormalizedEndpoint {
            path: "/users/{id}/orders/{orderId}".to_string(),
            method: "GET".to_string(),
            operation_id: None,
            summary: None,
            description: None,
            tags: vec![],
            parameters: vec![
                ParameterRecord {
                    name: "id".to_string(),
                    location: ParameterLocation::Path,
                    required: true,
                    schema: Some(json!({"type": "string"})),
                    description: None,
                    example: None,
                },
                ParameterRecord {
                    name: "orderId".to_string(),
                    location: ParameterLocation::Path,
                    required: true,
                    schema: Some(json!({"type": "integer"})),
                    description: None,
                    example: None,
                },
                ParameterRecord {
                    name: "expand".to_string(),
                    location: ParameterLocation::Query,
                    required: true,
                    schema: Some(json!({"type": "string"})),
                    description: None,
                    example: None,
                },
            ],
            request_body: None,
            responses: vec![],
            security: vec![],
            deprecated: false,
            extensions: vec![],
        };
        let schemes = BTreeMap::new();
        let schemas = BTreeMap::new();
        let context = ExampleContext {
            endpoint: &endpoint,
            document_base_url: None,
            schemes: &schemes,
            schemas: &schemas,
        };
        let snippet = generate_example(
            &context,
            &ExampleOptions { format: ExampleFormat::Curl, include_auth: true, base_url: None },
        )
        .unwrap();

        assert!(snippet.contains("/users/EXAMPLE_VALUE/orders/12345?expand=EXAMPLE_VALUE"));
    }

    #[test]
    fn test_javascript_snippet_shape() {
        let endpoint = post_users();
        let schemes = bearer_schemes();
        let schemas = schemas();
        let context = ExampleContext {
            endpoint: &endpoint,
            document_base_url: Some("https://api.example.com"),
            schemes: &schemes,
            schemas: &schemas,
        };
        let snippet = generate_example(
            &context,
            &ExampleOptions {
                format: ExampleFormat::Javascript,
                include_auth: true,
                base_url: None,
            },
        )
        .unwrap();

        assert!(snippet.contains("async function createUser()"));
        assert!(snippet.contains("method: \"POST\""));
        assert!(snippet.contains("body: JSON.stringify("));
        assert!(snippet.contains("Authorization"));
    }

    #[test]
    fn test_python_snippet_shape() {
        let endpoint = post_users();
        let schemes = bearer_schemes();
        let schemas = schemas();
        let context = ExampleContext {
            endpoint: &endpoint,
            document_base_url: Some("https://api.example.com"),
            schemes: &schemes,
            schemas: &schemas,
        };
        let snippet = generate_example(
            &context,
            &ExampleOptions { format: ExampleFormat::Python, include_auth: true, base_url: None },
        )
        .unwrap();

        assert!(snippet.contains("import requests"));
        assert!(snippet.contains("def create_user():"));
        assert!(snippet.contains("requests.post(url, headers=headers, json=payload)"));
        assert!(snippet.contains("response.raise_for_status()"));
    }

    #[test]
    fn test_complex_body_falls_back() {
        let mut endpoint = post_users();
        endpoint.request_body.as_mut().unwrap().content[0].schema = Some(json!({
            "$ref": "#/components/schemas/Nested"
        }));
        let schemes = BTreeMap::new();
        let mut schemas = BTreeMap::new();
        schemas.insert(
            "Nested".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "inner": {"$ref": "#/components/schemas/Other"}
                }
            }),
        );
        let context = ExampleContext {
            endpoint: &endpoint,
            document_base_url: None,
            schemes: &schemes,
            schemas: &schemas,
        };
        let snippet = generate_example(
            &context,
            &ExampleOptions { format: ExampleFormat::Curl, include_auth: false, base_url: None },
        )
        .unwrap();
        assert!(snippet.contains("{\"data\":\"example_value\"}"));
    }

    #[test]
    fn test_base_url_override_and_determinism() {
        let endpoint = post_users();
        let schemes = bearer_schemes();
        let schemas = schemas();
        let context = ExampleContext {
            endpoint: &endpoint,
            document_base_url: Some("https://api.example.com"),
            schemes: &schemes,
            schemas: &schemas,
        };
        let options = ExampleOptions {
            format: ExampleFormat::Curl,
            include_auth: true,
            base_url: Some("https://staging.example.com/".to_string()),
        };

        let first = generate_example(&context, &options).unwrap();
        let second = generate_example(&context, &options).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("https://staging.example.com/api/v1/users"));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ExampleFormat::parse("curl"), Some(ExampleFormat::Curl));
        assert_eq!(ExampleFormat::parse("javascript"), Some(ExampleFormat::Javascript));
        assert_eq!(ExampleFormat::parse("python"), Some(ExampleFormat::Python));
        assert_eq!(ExampleFormat::parse("go"), None);
    }
}
