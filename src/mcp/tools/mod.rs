//! MCP Tools Module
//!
//! The three tools exposed to AI agents: `searchEndpoints`, `getSchema`,
//! and `getExample`. Dispatch validates arguments against each tool's
//! contract, runs the body inside the resilience envelope, and records
//! per-request performance.

pub mod get_example;
pub mod get_schema;
pub mod search_endpoints;

pub use get_example::{execute_get_example, get_example_tool};
pub use get_schema::{execute_get_schema, get_schema_tool};
pub use search_endpoints::{execute_search_endpoints, search_endpoints_tool};

use crate::domain::RequestId;
use crate::mcp::error::McpError;
use crate::mcp::protocol::Tool;
use crate::mcp::resilience::{execute_with_envelope, RetryPolicy};
use crate::mcp::ServerState;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Retry budgets per tool: search and schema resolution get three
/// attempts, example generation two.
fn retries_for(tool: &str) -> u32 {
    match tool {
        "searchEndpoints" | "getSchema" => 3,
        "getExample" => 2,
        _ => 0,
    }
}

/// Get all available MCP tools.
pub fn get_all_tools() -> Vec<Tool> {
    vec![search_endpoints_tool(), get_schema_tool(), get_example_tool()]
}

/// Execute a tool by name: validate, wrap in the resilience envelope, run,
/// and record metrics. Validation failures surface before any store
/// access.
#[instrument(skip(state, args), fields(request_id = %request_id), name = "mcp_dispatch_tool")]
pub async fn dispatch_tool(
    state: &Arc<ServerState>,
    tool_name: &str,
    args: &Value,
    request_id: &RequestId,
) -> Result<Value, McpError> {
    let started = std::time::Instant::now();

    let result = match tool_name {
        "searchEndpoints" => {
            let validated = crate::mcp::validation::validate_search_arguments(args)?;
            let arguments = &validated;
            run_in_envelope(state, tool_name, move || execute_search_endpoints(state, arguments))
                .await
        }
        "getSchema" => {
            let validated = crate::mcp::validation::validate_get_schema_arguments(args)?;
            let arguments = &validated;
            run_in_envelope(state, tool_name, move || execute_get_schema(state, arguments)).await
        }
        "getExample" => {
            let validated = crate::mcp::validation::validate_get_example_arguments(args)?;
            let arguments = &validated;
            run_in_envelope(state, tool_name, move || execute_get_example(state, arguments)).await
        }
        unknown => Err(McpError::ToolNotFound(format!("Unknown tool: {unknown}"))),
    };

    let error_kind = result.as_ref().err().map(error_kind_label);
    state.monitor.record(tool_name, request_id, started.elapsed(), error_kind);

    result
}

async fn run_in_envelope<F, Fut>(
    state: &Arc<ServerState>,
    tool: &str,
    run: F,
) -> Result<Value, McpError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Value, McpError>>,
{
    let policy = RetryPolicy::from_config(&state.config.resilience, retries_for(tool));
    execute_with_envelope(
        &state.breaker,
        &state.slots,
        policy,
        state.config.resilience.tool_timeout(),
        tool,
        run,
    )
    .await
}

fn error_kind_label(error: &McpError) -> &'static str {
    match error {
        McpError::ParseError(_) => "ParseError",
        McpError::InvalidRequest(_) => "InvalidRequest",
        McpError::MethodNotFound(_) => "MethodNotFound",
        McpError::ToolNotFound(_) => "ToolNotFound",
        McpError::InvalidParams { .. } => "ValidationError",
        McpError::ResourceNotFound { .. } => "ResourceNotFound",
        McpError::SchemaResolution { .. } => "SchemaResolutionError",
        McpError::CodeGeneration { .. } => "CodeGenerationError",
        McpError::DatabaseConnection(_) => "DatabaseConnectionError",
        McpError::DatabaseTimeout { .. } => "DatabaseTimeoutError",
        McpError::ResourceExhausted { .. } => "ResourceExhausted",
        McpError::ServiceUnavailable { .. } => "ServiceUnavailable",
        McpError::NotInitialized => "NotInitialized",
        McpError::InternalError(_) => "InternalError",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_all_tools() {
        let tools = get_all_tools();
        assert_eq!(tools.len(), 3);

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"searchEndpoints"));
        assert!(names.contains(&"getSchema"));
        assert!(names.contains(&"getExample"));

        for tool in &tools {
            assert!(!tool.description.is_empty());
            assert_eq!(tool.input_schema["type"], "object");
        }
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let state = crate::mcp::tools::test_support::empty_state().await;
        let request_id = RequestId::new();

        let result = dispatch_tool(&state, "unknown_tool", &json!({}), &request_id).await;
        assert!(matches!(result, Err(McpError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn test_validation_failure_precedes_tool_body() {
        let state = crate::mcp::tools::test_support::empty_state().await;
        let request_id = RequestId::new();

        let result =
            dispatch_tool(&state, "searchEndpoints", &json!({"keywords": ""}), &request_id).await;
        let Err(McpError::InvalidParams { parameter, .. }) = result else {
            panic!("expected InvalidParams");
        };
        assert_eq!(parameter, "keywords");
    }
}
