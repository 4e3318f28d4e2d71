//! # Tool Parameter Validation
//!
//! Each tool declares a JSON-Schema input contract; arguments are checked
//! against the compiled schema first, then against targeted range and enum
//! rules that produce parameter-level suggestions. Any violation surfaces
//! as a ValidationError before the tool body runs.

use crate::codegen::ExampleFormat;
use crate::mcp::error::McpError;
use jsonschema::Validator;
use serde_json::{json, Value};
use std::sync::LazyLock;

pub const KNOWN_METHODS: [&str; 8] =
    ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "TRACE"];

const MAX_KEYWORDS_LENGTH: usize = 500;
const MAX_COMPONENT_NAME_LENGTH: usize = 255;
pub const MAX_PER_PAGE: usize = 50;
pub const MAX_RESOLUTION_DEPTH: usize = 10;

/// Input contract for `searchEndpoints`.
pub fn search_endpoints_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "keywords": {
                "type": "string",
                "minLength": 1,
                "maxLength": MAX_KEYWORDS_LENGTH,
                "description": "Search keywords; supports AND/OR/NOT, \"phrases\", field:value scoping and a trailing ~ for fuzzy matching"
            },
            "httpMethods": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Restrict results to these HTTP methods (GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS, TRACE)"
            },
            "page": {
                "type": "integer",
                "minimum": 1,
                "default": 1,
                "description": "1-based result page"
            },
            "perPage": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_PER_PAGE,
                "default": 20,
                "description": "Results per page"
            }
        },
        "required": ["keywords"]
    })
}

/// Input contract for `getSchema`.
pub fn get_schema_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "componentName": {
                "type": "string",
                "minLength": 1,
                "maxLength": MAX_COMPONENT_NAME_LENGTH,
                "description": "Schema name; accepts 'User', 'components/schemas/User', '#/components/schemas/User' or '#/definitions/User'"
            },
            "resolveDependencies": {
                "type": "boolean",
                "default": true,
                "description": "Expand $ref targets transitively"
            },
            "maxDepth": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_RESOLUTION_DEPTH,
                "default": 5,
                "description": "Maximum reference expansion depth"
            },
            "includeExamples": {
                "type": "boolean",
                "default": true,
                "description": "Keep example/examples/default keywords"
            },
            "includeExtensions": {
                "type": "boolean",
                "default": true,
                "description": "Keep x-* vendor extension keys"
            }
        },
        "required": ["componentName"]
    })
}

/// Input contract for `getExample`.
pub fn get_example_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "endpoint": {
                "type": "string",
                "minLength": 1,
                "description": "Endpoint path (e.g. /api/v1/users) or operationId"
            },
            "format": {
                "type": "string",
                "enum": ["curl", "javascript", "python"],
                "description": "Snippet language"
            },
            "method": {
                "type": "string",
                "enum": KNOWN_METHODS,
                "description": "HTTP method; required when 'endpoint' is a path"
            },
            "includeAuth": {
                "type": "boolean",
                "default": true,
                "description": "Include an authorization header for the endpoint's first security requirement"
            },
            "baseUrl": {
                "type": "string",
                "description": "Overrides the document's base URL"
            }
        },
        "required": ["endpoint", "format"]
    })
}

static SEARCH_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    jsonschema::validator_for(&search_endpoints_schema())
        .expect("searchEndpoints schema is a valid JSON Schema")
});
static GET_SCHEMA_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    jsonschema::validator_for(&get_schema_schema()).expect("getSchema schema is a valid JSON Schema")
});
static GET_EXAMPLE_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    jsonschema::validator_for(&get_example_schema())
        .expect("getExample schema is a valid JSON Schema")
});

/// Validated `searchEndpoints` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchArguments {
    pub keywords: String,
    pub http_methods: Option<Vec<String>>,
    pub page: usize,
    pub per_page: usize,
}

/// Validated `getSchema` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct GetSchemaArguments {
    pub component_name: String,
    pub resolve_dependencies: bool,
    pub max_depth: usize,
    pub include_examples: bool,
    pub include_extensions: bool,
}

/// Validated `getExample` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct GetExampleArguments {
    pub endpoint: String,
    pub format: ExampleFormat,
    pub method: Option<String>,
    pub include_auth: bool,
    pub base_url: Option<String>,
}

fn invalid<V: Into<Value>>(
    parameter: &str,
    value: V,
    message: &str,
    suggestions: &[&str],
) -> McpError {
    McpError::InvalidParams {
        parameter: parameter.to_string(),
        value: value.into(),
        message: message.to_string(),
        suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
    }
}

fn check_schema(validator: &Validator, args: &Value) -> Result<(), McpError> {
    if let Some(error) = validator.iter_errors(args).next() {
        let pointer = error.instance_path.to_string();
        let parameter =
            pointer.trim_start_matches('/').split('/').next().unwrap_or("arguments").to_string();
        let parameter = if parameter.is_empty() { "arguments".to_string() } else { parameter };
        return Err(McpError::InvalidParams {
            parameter,
            value: error.instance.clone().into_owned(),
            message: error.to_string(),
            suggestions: Vec::new(),
        });
    }
    Ok(())
}

/// Validate `searchEndpoints` arguments.
pub fn validate_search_arguments(args: &Value) -> Result<SearchArguments, McpError> {
    check_schema(&SEARCH_VALIDATOR, args)?;

    let keywords = args.get("keywords").and_then(Value::as_str).unwrap_or_default();
    if keywords.trim().is_empty() {
        return Err(invalid(
            "keywords",
            keywords,
            "keywords must not be empty",
            &["Provide at least one search term, e.g. \"users\""],
        ));
    }

    let http_methods = match args.get("httpMethods") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let methods: Vec<String> = value
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(|m| m.to_uppercase())
                .collect();
            for method in &methods {
                if !KNOWN_METHODS.contains(&method.as_str()) {
                    return Err(invalid(
                        "httpMethods",
                        value.clone(),
                        "unknown HTTP method",
                        &["Use one of GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS, TRACE"],
                    ));
                }
            }
            Some(methods)
        }
    };

    let page = args.get("page").and_then(Value::as_u64).unwrap_or(1) as usize;
    let per_page = args.get("perPage").and_then(Value::as_u64).unwrap_or(20) as usize;

    Ok(SearchArguments { keywords: keywords.to_string(), http_methods, page, per_page })
}

/// Validate `getSchema` arguments.
pub fn validate_get_schema_arguments(args: &Value) -> Result<GetSchemaArguments, McpError> {
    check_schema(&GET_SCHEMA_VALIDATOR, args)?;

    let component_name =
        args.get("componentName").and_then(Value::as_str).unwrap_or_default().trim().to_string();
    if component_name.is_empty() {
        return Err(invalid(
            "componentName",
            component_name.as_str(),
            "componentName must not be empty",
            &["Pass a schema name such as \"User\""],
        ));
    }

    Ok(GetSchemaArguments {
        component_name,
        resolve_dependencies: args
            .get("resolveDependencies")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        max_depth: args.get("maxDepth").and_then(Value::as_u64).unwrap_or(5) as usize,
        include_examples: args.get("includeExamples").and_then(Value::as_bool).unwrap_or(true),
        include_extensions: args.get("includeExtensions").and_then(Value::as_bool).unwrap_or(true),
    })
}

/// Validate `getExample` arguments. `method` is required when `endpoint`
/// is a path rather than an operationId.
pub fn validate_get_example_arguments(args: &Value) -> Result<GetExampleArguments, McpError> {
    check_schema(&GET_EXAMPLE_VALIDATOR, args)?;

    let endpoint =
        args.get("endpoint").and_then(Value::as_str).unwrap_or_default().trim().to_string();
    if endpoint.is_empty() {
        return Err(invalid(
            "endpoint",
            endpoint.as_str(),
            "endpoint must not be empty",
            &["Pass an endpoint path such as \"/api/v1/users\""],
        ));
    }

    let raw_format = args.get("format").and_then(Value::as_str).unwrap_or_default();
    let format = ExampleFormat::parse(raw_format).ok_or_else(|| {
        invalid(
            "format",
            raw_format,
            "unsupported example format",
            &["Use one of curl, javascript, python"],
        )
    })?;

    let method = args
        .get("method")
        .and_then(Value::as_str)
        .map(|m| m.to_uppercase());
    if endpoint.starts_with('/') && method.is_none() {
        return Err(invalid(
            "method",
            Value::Null,
            "method is required when endpoint is a path",
            &["Add method, e.g. \"GET\" or \"POST\""],
        ));
    }

    let base_url = match args.get("baseUrl").and_then(Value::as_str) {
        Some(raw) => {
            url::Url::parse(raw).map_err(|_| {
                invalid(
                    "baseUrl",
                    raw,
                    "baseUrl must be an absolute URL",
                    &["Use a full URL such as https://api.example.com"],
                )
            })?;
            Some(raw.to_string())
        }
        None => None,
    };

    Ok(GetExampleArguments {
        endpoint,
        format,
        method,
        include_auth: args.get("includeAuth").and_then(Value::as_bool).unwrap_or(true),
        base_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_arguments_defaults() {
        let args = validate_search_arguments(&json!({"keywords": "users"})).unwrap();
        assert_eq!(args.keywords, "users");
        assert_eq!(args.page, 1);
        assert_eq!(args.per_page, 20);
        assert!(args.http_methods.is_none());
    }

    #[test]
    fn test_search_rejects_empty_keywords() {
        let err = validate_search_arguments(&json!({"keywords": ""})).unwrap_err();
        let McpError::InvalidParams { parameter, .. } = &err else {
            panic!("expected InvalidParams, got {err:?}");
        };
        assert_eq!(parameter, "keywords");

        let err = validate_search_arguments(&json!({"keywords": "   "})).unwrap_err();
        let McpError::InvalidParams { parameter, suggestions, .. } = &err else {
            panic!("expected InvalidParams");
        };
        assert_eq!(parameter, "keywords");
        assert!(!suggestions.is_empty());
    }

    #[test]
    fn test_search_rejects_oversized_keywords() {
        let long = "x".repeat(MAX_KEYWORDS_LENGTH + 1);
        let err = validate_search_arguments(&json!({"keywords": long})).unwrap_err();
        assert!(matches!(err, McpError::InvalidParams { .. }));
    }

    #[test]
    fn test_search_rejects_bad_pagination() {
        assert!(validate_search_arguments(&json!({"keywords": "u", "page": 0})).is_err());
        assert!(validate_search_arguments(&json!({"keywords": "u", "perPage": 0})).is_err());
        assert!(validate_search_arguments(&json!({"keywords": "u", "perPage": 51})).is_err());
    }

    #[test]
    fn test_search_normalizes_methods() {
        let args = validate_search_arguments(
            &json!({"keywords": "users", "httpMethods": ["GET", "POST"]}),
        )
        .unwrap();
        assert_eq!(args.http_methods, Some(vec!["GET".to_string(), "POST".to_string()]));

        assert!(validate_search_arguments(
            &json!({"keywords": "users", "httpMethods": ["FETCH"]})
        )
        .is_err());
    }

    #[test]
    fn test_get_schema_defaults_and_bounds() {
        let args = validate_get_schema_arguments(&json!({"componentName": "User"})).unwrap();
        assert_eq!(args.component_name, "User");
        assert!(args.resolve_dependencies);
        assert_eq!(args.max_depth, 5);
        assert!(args.include_examples);

        assert!(
            validate_get_schema_arguments(&json!({"componentName": "User", "maxDepth": 0}))
                .is_err()
        );
        assert!(
            validate_get_schema_arguments(&json!({"componentName": "User", "maxDepth": 11}))
                .is_err()
        );
    }

    #[test]
    fn test_get_example_requires_method_for_paths() {
        let err = validate_get_example_arguments(
            &json!({"endpoint": "/api/v1/users", "format": "curl"}),
        )
        .unwrap_err();
        let McpError::InvalidParams { parameter, .. } = &err else {
            panic!("expected InvalidParams");
        };
        assert_eq!(parameter, "method");

        let ok = validate_get_example_arguments(
            &json!({"endpoint": "/api/v1/users", "format": "curl", "method": "post"}),
        )
        .unwrap();
        assert_eq!(ok.method.as_deref(), Some("POST"));

        // operationId endpoints do not need a method.
        let ok = validate_get_example_arguments(
            &json!({"endpoint": "createUser", "format": "python"}),
        )
        .unwrap();
        assert!(ok.method.is_none());
    }

    #[test]
    fn test_get_example_rejects_unknown_format() {
        let err =
            validate_get_example_arguments(&json!({"endpoint": "createUser", "format": "go"}))
                .unwrap_err();
        assert!(matches!(err, McpError::InvalidParams { .. }));
    }

    #[test]
    fn test_get_example_validates_base_url() {
        assert!(validate_get_example_arguments(&json!({
            "endpoint": "createUser",
            "format": "curl",
            "baseUrl": "not a url"
        }))
        .is_err());

        let ok = validate_get_example_arguments(&json!({
            "endpoint": "createUser",
            "format": "curl",
            "baseUrl": "https://staging.example.com"
        }))
        .unwrap();
        assert_eq!(ok.base_url.as_deref(), Some("https://staging.example.com"));
    }
}
