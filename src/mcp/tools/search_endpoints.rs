//! `searchEndpoints` tool
//!
//! Keyword search over endpoint records: boolean and field-scoped query
//! syntax, filtering, ranking, clustering, and pagination.

use crate::mcp::error::McpError;
use crate::mcp::protocol::Tool;
use crate::mcp::validation::{search_endpoints_schema, SearchArguments};
use crate::mcp::ServerState;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

/// Tool definition for searching endpoints
pub fn search_endpoints_tool() -> Tool {
    Tool::new(
        "searchEndpoints",
        r#"Search API endpoints by keyword.

PURPOSE: Find endpoints in the ingested OpenAPI specification by path,
summary, description, tags, parameter names, response schemas or status
codes.

QUERY SYNTAX:
- Plain terms: "list users" (terms are AND-ed)
- Boolean: users AND create, users OR accounts, users NOT deprecated
- Phrases: "exact phrase"
- Field scoping: path:users, method:POST, tag:admin, auth:bearerAuth,
  param:id, response:User, status:404
- Fuzzy: usres~ (edit distance up to 2)

RESULTS: Each hit carries its operation type (list/read/create/update/
delete/search/upload/action), a parameter summary, authentication info,
response info, a complexity level, and the schemas it reads or writes.
Results are clustered by tag, resource, method, operation type,
complexity and auth requirement. Responses are paginated; page is
1-based.

SUGGESTIONS: Low-hit queries return up to five alternatives (spelling
corrections, dropped filters, cross-modal hints).

RELATED TOOLS: getSchema (inspect a schema), getExample (client code)."#,
        search_endpoints_schema(),
    )
}

/// Execute `searchEndpoints`.
#[instrument(skip(state, args), fields(keywords = %args.keywords), name = "mcp_execute_search_endpoints")]
pub async fn execute_search_endpoints(
    state: &Arc<ServerState>,
    args: &SearchArguments,
) -> Result<Value, McpError> {
    let filters = match &args.http_methods {
        Some(methods) => json!({ "methods": methods }),
        None => json!({}),
    };

    let response = state
        .search
        .search_endpoints(&args.keywords, &filters, args.page, args.per_page)
        .await?;

    serde_json::to_value(&response)
        .map_err(|e| McpError::InternalError(format!("Failed to serialize search response: {e}")))
}
