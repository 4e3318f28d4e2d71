//! `getExample` tool
//!
//! Generate a runnable client-code snippet (curl, JavaScript, or Python)
//! for one endpoint.

use crate::codegen::{generate_example, ExampleContext, ExampleOptions};
use crate::mcp::error::McpError;
use crate::mcp::protocol::Tool;
use crate::mcp::validation::{get_example_schema, GetExampleArguments};
use crate::mcp::ServerState;
use crate::storage::{
    ApiDocumentRepository, EndpointData, EndpointRepository, SchemaRepository,
    SecuritySchemeRepository,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Tool definition for generating code examples
pub fn get_example_tool() -> Tool {
    Tool::new(
        "getExample",
        r#"Generate a runnable client-code example for an endpoint.

PURPOSE: Produce a copy-pasteable request snippet for one endpoint of
the ingested specification.

FORMATS: curl, javascript (fetch), python (requests).

ADDRESSING: Pass the endpoint path plus a method
(endpoint="/api/v1/users", method="POST"), or an operationId
(endpoint="createUser").

CONTENT: Path parameters are replaced with placeholders (EXAMPLE_VALUE
for strings, 12345 for numbers); required query parameters are included.
Headers always carry Accept: application/json, plus Content-Type for
methods with a body. With includeAuth=true the endpoint's first security
requirement becomes an Authorization or API-key header placeholder. The
request-body placeholder is derived from the referenced schema when it
is a flat object.

RELATED TOOLS: searchEndpoints (find endpoints), getSchema (inspect a schema)."#,
        get_example_schema(),
    )
}

/// Execute `getExample`.
#[instrument(skip(state, args), fields(endpoint = %args.endpoint), name = "mcp_execute_get_example")]
pub async fn execute_get_example(
    state: &Arc<ServerState>,
    args: &GetExampleArguments,
) -> Result<Value, McpError> {
    let snapshot = state.search.snapshot().await;
    let Some(document_id) = snapshot.document_id else {
        return Err(McpError::ResourceNotFound {
            resource_type: "Endpoint".to_string(),
            name: args.endpoint.clone(),
            similar: Vec::new(),
        });
    };

    let endpoint = find_endpoint(state, document_id, args).await?;

    let document =
        ApiDocumentRepository::new(state.pool.clone()).get_by_id(document_id).await?;
    let schemas = SchemaRepository::new(state.pool.clone())
        .list_all(document_id)
        .await
        .map_err(McpError::from)?;
    let schema_catalog: BTreeMap<String, Value> =
        schemas.into_iter().map(|s| (s.record.name.clone(), s.record.body)).collect();
    let schemes = SecuritySchemeRepository::new(state.pool.clone())
        .list_all(document_id)
        .await
        .map_err(McpError::from)?;
    let scheme_catalog: BTreeMap<_, _> =
        schemes.into_iter().map(|s| (s.record.name.clone(), s.record)).collect();

    let context = ExampleContext {
        endpoint: &endpoint.record,
        document_base_url: document.info.base_url.as_deref(),
        schemes: &scheme_catalog,
        schemas: &schema_catalog,
    };
    let options = ExampleOptions {
        format: args.format,
        include_auth: args.include_auth,
        base_url: args.base_url.clone(),
    };
    let snippet = generate_example(&context, &options).map_err(McpError::from)?;

    Ok(json!({
        "endpoint": endpoint.record.path,
        "method": endpoint.record.method,
        "format": args.format.as_str(),
        "example": snippet,
        "includesAuth": args.include_auth && !endpoint.record.security.is_empty(),
    }))
}

/// Resolve the endpoint argument: a path (with the validated method) or an
/// operationId. Misses surface −1001 with similar endpoint keys.
async fn find_endpoint(
    state: &Arc<ServerState>,
    document_id: i64,
    args: &GetExampleArguments,
) -> Result<EndpointData, McpError> {
    let repository = EndpointRepository::new(state.pool.clone());

    if args.endpoint.starts_with('/') {
        let method = args.method.as_deref().unwrap_or("GET");
        if let Some(endpoint) =
            repository.get_by_path_method(document_id, &args.endpoint, method).await?
        {
            return Ok(endpoint);
        }
    } else {
        let all = repository.list_all(document_id).await?;
        if let Some(endpoint) = all
            .into_iter()
            .find(|e| e.record.operation_id.as_deref() == Some(args.endpoint.as_str()))
        {
            return Ok(endpoint);
        }
    }

    let keys = repository.list_keys(document_id).await?;
    let needle = args.endpoint.to_lowercase();
    let mut similar: Vec<String> = keys
        .iter()
        .filter(|(path, _)| {
            let path = path.to_lowercase();
            path.contains(&needle) || needle.contains(&path) || strsim::levenshtein(&path, &needle) <= 3
        })
        .map(|(path, method)| format!("{method} {path}"))
        .collect();
    similar.truncate(5);

    Err(McpError::ResourceNotFound {
        resource_type: "Endpoint".to_string(),
        name: args.endpoint.clone(),
        similar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequestId;
    use crate::mcp::tools::{dispatch_tool, test_support::fixture_state};

    #[tokio::test]
    async fn test_curl_example_with_auth() {
        let state = fixture_state().await;
        let result = dispatch_tool(
            &state,
            "getExample",
            &json!({
                "endpoint": "/api/v1/users",
                "format": "curl",
                "method": "POST",
                "includeAuth": true
            }),
            &RequestId::new(),
        )
        .await
        .unwrap();

        let snippet = result["example"].as_str().unwrap();
        assert!(snippet.contains("curl -X POST"));
        assert!(snippet.contains("/api/v1/users\""));
        assert!(snippet.contains("Authorization: Bearer YOUR_TOKEN_HERE"));
        assert!(snippet.contains("Content-Type: application/json"));
        assert!(snippet.contains("-d '{"));
        assert_eq!(result["includesAuth"], true);
    }

    #[tokio::test]
    async fn test_lookup_by_operation_id() {
        let state = fixture_state().await;
        let result = dispatch_tool(
            &state,
            "getExample",
            &json!({"endpoint": "createUser", "format": "python"}),
            &RequestId::new(),
        )
        .await
        .unwrap();

        assert_eq!(result["method"], "POST");
        assert!(result["example"].as_str().unwrap().contains("import requests"));
    }

    #[tokio::test]
    async fn test_missing_endpoint_lists_similar() {
        let state = fixture_state().await;
        let err = dispatch_tool(
            &state,
            "getExample",
            &json!({"endpoint": "/api/v1/users/extra", "format": "curl", "method": "GET"}),
            &RequestId::new(),
        )
        .await
        .unwrap_err();

        let McpError::ResourceNotFound { similar, .. } = &err else {
            panic!("expected ResourceNotFound");
        };
        assert!(!similar.is_empty());
        assert_eq!(err.error_code(), -1001);
    }

    #[tokio::test]
    async fn test_examples_are_deterministic() {
        let state = fixture_state().await;
        let args = json!({
            "endpoint": "/api/v1/users",
            "format": "javascript",
            "method": "POST"
        });
        let first =
            dispatch_tool(&state, "getExample", &args, &RequestId::new()).await.unwrap();
        let second =
            dispatch_tool(&state, "getExample", &args, &RequestId::new()).await.unwrap();
        assert_eq!(first["example"], second["example"]);
    }
}
