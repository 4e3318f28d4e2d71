//! # Error Handling
//!
//! This module provides error handling for the apiscope server. It defines
//! custom error types using `thiserror` for all operations.

/// Custom result type for apiscope operations
pub type Result<T> = std::result::Result<T, ApiscopeError>;

/// Main error type for the apiscope server
#[derive(thiserror::Error, Debug)]
pub enum ApiscopeError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Specification parsing errors (syntax-level, unrecoverable)
    #[error("Parse error: {context}")]
    Parse {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Resource conflict errors (e.g., already exists)
    #[error("Resource conflict: {message}")]
    Conflict { message: String, resource_type: String },

    /// Timeout errors
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Concurrency cap reached
    #[error("Resource exhausted: {resource} ({current}/{limit})")]
    ResourceExhausted { resource: String, current: usize, limit: usize },

    /// Circuit breaker is open or the server is shutting down
    #[error("Service unavailable: {message}")]
    Unavailable { message: String, retry_after_seconds: Option<u64> },

    /// Schema reference resolution failures
    #[error("Schema resolution error for '{schema}': {message}")]
    SchemaResolution { schema: String, message: String },

    /// Code example generation failures
    #[error("Code generation error for '{endpoint}' ({format}): {message}")]
    CodeGeneration { endpoint: String, format: String, message: String },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ApiscopeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a database error with context
    pub fn database(source: sqlx::Error, context: String) -> Self {
        Self::Database { source, context }
    }

    /// Create a parse error
    pub fn parse<S: Into<String>>(context: S) -> Self {
        Self::Parse { context: context.into(), source: None }
    }

    /// Create a parse error with source
    pub fn parse_with_source<S: Into<String>>(
        context: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Parse { context: context.into(), source: Some(source) }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a conflict error
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict { message: message.into(), resource_type: resource_type.into() }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), duration_ms }
    }

    /// Create a resource exhausted error
    pub fn exhausted<S: Into<String>>(resource: S, current: usize, limit: usize) -> Self {
        Self::ResourceExhausted { resource: resource.into(), current, limit }
    }

    /// Create a service unavailable error
    pub fn unavailable<S: Into<String>>(message: S, retry_after_seconds: Option<u64>) -> Self {
        Self::Unavailable { message: message.into(), retry_after_seconds }
    }

    /// Create a schema resolution error
    pub fn schema_resolution<N: Into<String>, M: Into<String>>(schema: N, message: M) -> Self {
        Self::SchemaResolution { schema: schema.into(), message: message.into() }
    }

    /// Create a code generation error
    pub fn code_generation<E, F, M>(endpoint: E, format: F, message: M) -> Self
    where
        E: Into<String>,
        F: Into<String>,
        M: Into<String>,
    {
        Self::CodeGeneration {
            endpoint: endpoint.into(),
            format: format.into(),
            message: message.into(),
        }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Create a serialization error with custom context
    pub fn serialization<S: Into<String>>(source: serde_json::Error, context: S) -> Self {
        Self::Serialization { source, context: context.into() }
    }

    /// Check if this error is transient and may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiscopeError::Database { .. }
                | ApiscopeError::Io { .. }
                | ApiscopeError::Timeout { .. }
                | ApiscopeError::ResourceExhausted { .. }
        )
    }

    /// Get the HTTP-ish status code used in logs and health output
    pub fn status_code(&self) -> u16 {
        match self {
            ApiscopeError::Config { .. } => 500,
            ApiscopeError::Database { .. } => 500,
            ApiscopeError::Io { .. } => 500,
            ApiscopeError::Serialization { .. } => 400,
            ApiscopeError::Parse { .. } => 400,
            ApiscopeError::Validation { .. } => 400,
            ApiscopeError::NotFound { .. } => 404,
            ApiscopeError::Conflict { .. } => 409,
            ApiscopeError::Timeout { .. } => 408,
            ApiscopeError::ResourceExhausted { .. } => 429,
            ApiscopeError::Unavailable { .. } => 503,
            ApiscopeError::SchemaResolution { .. } => 422,
            ApiscopeError::CodeGeneration { .. } => 422,
            ApiscopeError::Internal { .. } => 500,
        }
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for ApiscopeError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<std::io::Error> for ApiscopeError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for ApiscopeError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<config::ConfigError> for ApiscopeError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for ApiscopeError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
