//! MCP Request Handler
//!
//! JSON-RPC dispatch for the MCP protocol: initialize, tools/list,
//! tools/call, resources/list and resources/read. Errors are logged once
//! here, at the boundary, with the request correlation id.

use crate::domain::RequestId;
use crate::mcp::error::McpError;
use crate::mcp::protocol::{
    Capabilities, InitializeRequest, InitializeResponse, JsonRpcRequest, JsonRpcResponse,
    Resource, ResourceCapabilities, ResourceContent, ResourceReadParams, ResourceReadResult,
    ResourcesListResult, ServerInfo, ToolCallRequest, ToolCallResult, ToolCapabilities,
    ToolsListResult,
};
use crate::mcp::{tools, ServerState, PROTOCOL_VERSION};
use crate::observability::health;
use crate::storage::{ApiDocumentRepository, EndpointRepository, SchemaRepository};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, instrument};

const INFO_RESOURCE_URI: &str = "apiscope://info";
const HEALTH_RESOURCE_URI: &str = "apiscope://health";

/// Handler for MCP JSON-RPC requests.
pub struct McpHandler {
    state: Arc<ServerState>,
    initialized: AtomicBool,
}

impl McpHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state, initialized: AtomicBool::new(false) }
    }

    /// Handle one request. Notifications return `None`.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                request.id,
                McpError::InvalidRequest("jsonrpc must be \"2.0\"".to_string()).into(),
            ));
        }

        let id = request.id.clone();
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => {
                info!("MCP client initialized");
                return None;
            }
            method if method.starts_with("notifications/") => return None,
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tool_call(request.params).await,
            "resources/list" => self.handle_resources_list(),
            "resources/read" => self.handle_resource_read(request.params).await,
            unknown => Err(McpError::MethodNotFound(unknown.to_string())),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::failure(id, error.into()),
        })
    }

    fn handle_initialize(&self, params: Value) -> Result<Value, McpError> {
        let request: InitializeRequest = serde_json::from_value(params)
            .map_err(|e| McpError::InvalidParams {
                parameter: "params".to_string(),
                value: Value::Null,
                message: format!("Malformed initialize parameters: {e}"),
                suggestions: Vec::new(),
            })?;

        info!(
            client = %request.client_info.name,
            client_version = %request.client_info.version,
            protocol = %request.protocol_version,
            "MCP initialize"
        );
        self.initialized.store(true, Ordering::SeqCst);

        let response = InitializeResponse {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Capabilities {
                tools: Some(ToolCapabilities { list_changed: Some(false) }),
                resources: Some(ResourceCapabilities {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
            },
            server_info: ServerInfo {
                name: self.state.config.server.name.clone(),
                version: crate::VERSION.to_string(),
            },
        };
        serde_json::to_value(response).map_err(|e| McpError::InternalError(e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<Value, McpError> {
        let result = ToolsListResult { tools: tools::get_all_tools(), next_cursor: None };
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    #[instrument(skip(self, params), name = "mcp_tool_call")]
    async fn handle_tool_call(&self, params: Value) -> Result<Value, McpError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(McpError::NotInitialized);
        }

        let call: ToolCallRequest = serde_json::from_value(params).map_err(|e| {
            McpError::InvalidParams {
                parameter: "params".to_string(),
                value: Value::Null,
                message: format!("Malformed tool call parameters: {e}"),
                suggestions: Vec::new(),
            }
        })?;

        let request_id = RequestId::new();
        let arguments = call.arguments.unwrap_or_else(|| json!({}));

        match tools::dispatch_tool(&self.state, &call.name, &arguments, &request_id).await {
            Ok(payload) => {
                let result = ToolCallResult::json(&payload);
                serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
            }
            Err(mcp_error) => {
                // The single boundary log for this failure; deeper layers
                // do not log user-visible error strings.
                error!(
                    request_id = %request_id,
                    tool = %call.name,
                    code = mcp_error.error_code(),
                    error = %mcp_error,
                    "Tool call failed"
                );
                Err(mcp_error)
            }
        }
    }

    fn handle_resources_list(&self) -> Result<Value, McpError> {
        let result = ResourcesListResult {
            resources: vec![
                Resource {
                    uri: INFO_RESOURCE_URI.to_string(),
                    name: "API information".to_string(),
                    description: Some(
                        "Title, version and record counts of the ingested specification"
                            .to_string(),
                    ),
                    mime_type: Some("application/json".to_string()),
                },
                Resource {
                    uri: HEALTH_RESOURCE_URI.to_string(),
                    name: "Server health".to_string(),
                    description: Some(
                        "Component health, breaker state and per-tool performance".to_string(),
                    ),
                    mime_type: Some("application/json".to_string()),
                },
            ],
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_resource_read(&self, params: Value) -> Result<Value, McpError> {
        let read: ResourceReadParams = serde_json::from_value(params).map_err(|e| {
            McpError::InvalidParams {
                parameter: "uri".to_string(),
                value: Value::Null,
                message: format!("Malformed resource read parameters: {e}"),
                suggestions: Vec::new(),
            }
        })?;

        let payload = match read.uri.as_str() {
            INFO_RESOURCE_URI => self.api_info().await?,
            HEALTH_RESOURCE_URI => {
                serde_json::to_value(health::check(&self.state).await)
                    .map_err(|e| McpError::InternalError(e.to_string()))?
            }
            other => {
                return Err(McpError::ResourceNotFound {
                    resource_type: "Resource".to_string(),
                    name: other.to_string(),
                    similar: vec![
                        INFO_RESOURCE_URI.to_string(),
                        HEALTH_RESOURCE_URI.to_string(),
                    ],
                })
            }
        };

        let result = ResourceReadResult {
            contents: vec![ResourceContent {
                uri: read.uri,
                mime_type: Some("application/json".to_string()),
                text: Some(serde_json::to_string_pretty(&payload).unwrap_or_default()),
                blob: None,
            }],
        };
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn api_info(&self) -> Result<Value, McpError> {
        let snapshot = self.state.search.snapshot().await;
        let Some(document_id) = snapshot.document_id else {
            return Ok(json!({
                "ingested": false,
                "message": "No API document has been ingested yet",
            }));
        };

        let document =
            ApiDocumentRepository::new(self.state.pool.clone()).get_by_id(document_id).await?;
        let endpoint_count =
            EndpointRepository::new(self.state.pool.clone()).count(document_id).await?;
        let schema_count =
            SchemaRepository::new(self.state.pool.clone()).count(document_id).await?;

        Ok(json!({
            "ingested": true,
            "title": document.info.title,
            "version": document.info.version,
            "openapiVersion": document.info.openapi_version,
            "baseUrl": document.info.base_url,
            "endpoints": endpoint_count,
            "schemas": schema_count,
            "ingestedAt": document.created_at.to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::JsonRpcId;
    use crate::mcp::tools::test_support::fixture_state;

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(JsonRpcId::Number(1)),
            method: method.to_string(),
            params,
        }
    }

    async fn initialized_handler() -> McpHandler {
        let handler = McpHandler::new(fixture_state().await);
        handler
            .handle(request(
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test", "version": "0.0.1"}
                }),
            ))
            .await
            .unwrap();
        handler
    }

    #[tokio::test]
    async fn test_initialize_and_tools_list() {
        let handler = initialized_handler().await;

        let response = handler.handle(request("tools/list", json!({}))).await.unwrap();
        let tools = &response.result.unwrap()["tools"];
        assert_eq!(tools.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tool_call_requires_initialize() {
        let handler = McpHandler::new(fixture_state().await);
        let response = handler
            .handle(request(
                "tools/call",
                json!({"name": "searchEndpoints", "arguments": {"keywords": "users"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_tool_call_success_envelope() {
        let handler = initialized_handler().await;
        let response = handler
            .handle(request(
                "tools/call",
                json!({"name": "searchEndpoints", "arguments": {"keywords": "users"}}),
            ))
            .await
            .unwrap();

        let result = response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"total\": 3"));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_validation_failure_shape() {
        let handler = initialized_handler().await;
        let response = handler
            .handle(request(
                "tools/call",
                json!({"name": "searchEndpoints", "arguments": {"keywords": ""}}),
            ))
            .await
            .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, -32602);
        let data = error.data.unwrap();
        assert_eq!(data["parameter"], "keywords");
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let handler = initialized_handler().await;
        let response = handler.handle(request("bogus/method", json!({}))).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_notifications_produce_no_response() {
        let handler = initialized_handler().await;
        let mut notification = request("notifications/initialized", json!({}));
        notification.id = None;
        assert!(handler.handle(notification).await.is_none());
    }

    #[tokio::test]
    async fn test_resources() {
        let handler = initialized_handler().await;

        let response = handler.handle(request("resources/list", json!({}))).await.unwrap();
        let resources = response.result.unwrap()["resources"].clone();
        assert_eq!(resources.as_array().unwrap().len(), 2);

        let response = handler
            .handle(request("resources/read", json!({"uri": "apiscope://info"})))
            .await
            .unwrap();
        let text = response.result.unwrap()["contents"][0]["text"].clone();
        assert!(text.as_str().unwrap().contains("Test API"));

        let response = handler
            .handle(request("resources/read", json!({"uri": "apiscope://nope"})))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -1001);
    }
}
