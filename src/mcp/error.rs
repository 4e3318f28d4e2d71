//! MCP Error Types
//!
//! One error enum for the request engine, mapped onto JSON-RPC error
//! objects at the transport boundary. Sensitive keys are stripped from
//! `error.data` before anything is emitted.

use crate::errors::ApiscopeError;
use crate::mcp::protocol::{error_codes, JsonRpcError};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;
use thiserror::Error;

/// Keys stripped from error payloads before emission.
static SENSITIVE_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(password|token|secret|credential|api_key|apikey)")
        .expect("sensitive key regex is valid")
});

#[derive(Error, Debug)]
pub enum McpError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameter '{parameter}': {message}")]
    InvalidParams {
        parameter: String,
        value: Value,
        message: String,
        suggestions: Vec<String>,
    },

    #[error("{resource_type} not found: {name}")]
    ResourceNotFound {
        resource_type: String,
        name: String,
        similar: Vec<String>,
    },

    #[error("Schema resolution failed for '{schema}': {message}")]
    SchemaResolution {
        schema: String,
        message: String,
        cycle_path: Vec<String>,
    },

    #[error("Code generation failed for '{endpoint}' ({format}): {message}")]
    CodeGeneration {
        endpoint: String,
        format: String,
        message: String,
    },

    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    #[error("Operation '{operation}' timed out after {timeout_ms}ms")]
    DatabaseTimeout { operation: String, timeout_ms: u64 },

    #[error("Resource exhausted: {resource} ({current}/{limit})")]
    ResourceExhausted {
        resource: String,
        current: usize,
        limit: usize,
        retry_after_seconds: u64,
    },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        message: String,
        retry_after_seconds: u64,
    },

    #[error("Not initialized")]
    NotInitialized,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl McpError {
    /// Convert to a JSON-RPC error code.
    pub fn error_code(&self) -> i32 {
        match self {
            McpError::ParseError(_) => error_codes::PARSE_ERROR,
            McpError::InvalidRequest(_) | McpError::NotInitialized => error_codes::INVALID_REQUEST,
            McpError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            McpError::ToolNotFound(_) | McpError::InvalidParams { .. } => {
                error_codes::INVALID_PARAMS
            }
            McpError::ResourceNotFound { .. } => error_codes::RESOURCE_NOT_FOUND,
            McpError::SchemaResolution { .. } => error_codes::SCHEMA_RESOLUTION_FAILURE,
            McpError::CodeGeneration { .. } => error_codes::CODE_GENERATION_FAILURE,
            McpError::DatabaseConnection(_)
            | McpError::DatabaseTimeout { .. }
            | McpError::ResourceExhausted { .. }
            | McpError::ServiceUnavailable { .. }
            | McpError::InternalError(_) => error_codes::INTERNAL_ERROR,
        }
    }

    /// Transient failures are retried by the resilience envelope:
    /// connection problems, timeouts, and exhausted resources.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            McpError::DatabaseConnection(_)
                | McpError::DatabaseTimeout { .. }
                | McpError::ResourceExhausted { .. }
        )
    }

    /// Structured payload for `error.data`, before sanitization.
    fn data(&self) -> Option<Value> {
        match self {
            McpError::InvalidParams { parameter, value, suggestions, .. } => Some(json!({
                "parameter": parameter,
                "value": value,
                "suggestions": suggestions,
            })),
            McpError::ResourceNotFound { similar, .. } => Some(json!({ "similar": similar })),
            McpError::SchemaResolution { cycle_path, .. } if !cycle_path.is_empty() => {
                Some(json!({ "cycle_path": cycle_path }))
            }
            McpError::SchemaResolution { .. } => None,
            McpError::CodeGeneration { endpoint, format, .. } => Some(json!({
                "endpoint": endpoint,
                "format": format,
            })),
            McpError::DatabaseConnection(_) => Some(json!({ "recoverable": true })),
            McpError::DatabaseTimeout { operation, timeout_ms } => Some(json!({
                "recoverable": true,
                "operation": operation,
                "timeout_ms": timeout_ms,
            })),
            McpError::ResourceExhausted { retry_after_seconds, .. } => Some(json!({
                "recoverable": true,
                "retry_after_seconds": retry_after_seconds,
            })),
            McpError::ServiceUnavailable { retry_after_seconds, .. } => Some(json!({
                "recoverable": true,
                "retry_after_seconds": retry_after_seconds,
            })),
            _ => None,
        }
    }

    /// Convert to a JsonRpcError with sensitive fields scrubbed.
    pub fn to_json_rpc_error(&self) -> JsonRpcError {
        let data = self.data().map(|mut value| {
            sanitize_error_data(&mut value);
            value
        });
        JsonRpcError { code: self.error_code(), message: self.to_string(), data }
    }
}

impl From<McpError> for JsonRpcError {
    fn from(error: McpError) -> Self {
        error.to_json_rpc_error()
    }
}

impl From<ApiscopeError> for McpError {
    fn from(error: ApiscopeError) -> Self {
        match error {
            ApiscopeError::Database { context, .. } | ApiscopeError::Io { context, .. } => {
                McpError::DatabaseConnection(context)
            }
            ApiscopeError::Timeout { operation, duration_ms } => {
                McpError::DatabaseTimeout { operation, timeout_ms: duration_ms }
            }
            ApiscopeError::ResourceExhausted { resource, current, limit } => {
                McpError::ResourceExhausted { resource, current, limit, retry_after_seconds: 1 }
            }
            ApiscopeError::Unavailable { message, retry_after_seconds } => {
                McpError::ServiceUnavailable {
                    message,
                    retry_after_seconds: retry_after_seconds.unwrap_or(30),
                }
            }
            ApiscopeError::NotFound { resource_type, id } => McpError::ResourceNotFound {
                resource_type,
                name: id,
                similar: Vec::new(),
            },
            ApiscopeError::Validation { message, field } => McpError::InvalidParams {
                parameter: field.unwrap_or_else(|| "request".to_string()),
                value: Value::Null,
                message,
                suggestions: Vec::new(),
            },
            ApiscopeError::SchemaResolution { schema, message } => {
                McpError::SchemaResolution { schema, message, cycle_path: Vec::new() }
            }
            ApiscopeError::CodeGeneration { endpoint, format, message } => {
                McpError::CodeGeneration { endpoint, format, message }
            }
            other => McpError::InternalError(other.to_string()),
        }
    }
}

/// Recursively remove keys matching the sensitive set from a JSON value.
pub fn sanitize_error_data(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !SENSITIVE_KEY_REGEX.is_match(key));
            for child in map.values_mut() {
                sanitize_error_data(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                sanitize_error_data(item);
            }
        }
        _ => {}
    }
}
