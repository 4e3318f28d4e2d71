//! End-to-end scenarios through the MCP tool surface: ingest a
//! specification, then drive the tools exactly as an MCP client would.

mod common;

use apiscope::domain::RequestId;
use apiscope::mcp::error::McpError;
use apiscope::mcp::tools::dispatch_tool;
use common::{chain_spec, cyclic_spec, state_with_spec, users_spec};
use serde_json::json;

#[tokio::test]
async fn simple_search_returns_all_user_endpoints() {
    let state = state_with_spec(&users_spec()).await;

    let result = dispatch_tool(
        &state,
        "searchEndpoints",
        &json!({"keywords": "users", "page": 1, "perPage": 10}),
        &RequestId::new(),
    )
    .await
    .unwrap();

    assert_eq!(result["pagination"]["total"], 3);

    let results = result["results"].as_array().unwrap();
    let types: Vec<&str> =
        results.iter().map(|r| r["operation_type"].as_str().unwrap()).collect();
    assert!(types.contains(&"list"));
    assert!(types.contains(&"create"));
    assert!(types.contains(&"read"));

    // Scores are descending; the list endpoint (summary mentions users)
    // ranks first among the GETs on /api/v1/users.
    let scores: Vec<f64> = results.iter().map(|r| r["score"].as_f64().unwrap()).collect();
    for pair in scores.windows(2) {
        assert!(pair[0] >= pair[1], "scores must be descending: {scores:?}");
    }
    assert_eq!(results[0]["operation_type"], "list");
}

#[tokio::test]
async fn method_filter_returns_only_post() {
    let state = state_with_spec(&users_spec()).await;

    let result = dispatch_tool(
        &state,
        "searchEndpoints",
        &json!({"keywords": "users", "httpMethods": ["POST"]}),
        &RequestId::new(),
    )
    .await
    .unwrap();

    let results = result["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["method"], "POST");
    assert_eq!(results[0]["path"], "/api/v1/users");
}

#[tokio::test]
async fn schema_resolution_contains_cycle() {
    let state = state_with_spec(&cyclic_spec()).await;

    let result = dispatch_tool(
        &state,
        "getSchema",
        &json!({"componentName": "User", "maxDepth": 3}),
        &RequestId::new(),
    )
    .await
    .unwrap();

    // profile expands into a Profile whose owner stays a bare reference.
    let profile = &result["schema"]["properties"]["profile"];
    assert_eq!(profile["$ref"], "#/components/schemas/Profile");
    assert!(profile["resolved"].is_object());
    let owner = &profile["resolved"]["properties"]["owner"];
    assert_eq!(owner["$ref"], "#/components/schemas/User");
    assert!(owner.get("resolved").is_none());

    let cycles: Vec<&str> = result["circularReferences"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    assert!(cycles.contains(&"User -> Profile -> User"), "cycles: {cycles:?}");
    assert!(result["metadata"]["totalDependencies"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn depth_limit_stops_expansion() {
    let state = state_with_spec(&chain_spec()).await;

    let result = dispatch_tool(
        &state,
        "getSchema",
        &json!({"componentName": "A", "maxDepth": 2}),
        &RequestId::new(),
    )
    .await
    .unwrap();

    let b = &result["schema"]["properties"]["b"];
    assert!(b["resolved"].is_object(), "B must be expanded");
    let c = &b["resolved"]["properties"]["c"];
    assert_eq!(c["$ref"], "#/components/schemas/C");
    assert!(c.get("resolved").is_none(), "C must stay a bare $ref");
    assert_eq!(result["metadata"]["maxDepthReached"], true);
}

#[tokio::test]
async fn curl_generation_with_auth() {
    let state = state_with_spec(&users_spec()).await;

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
    assert!(snippet.contains("/api/v1/users\""), "URL must end in the path: {snippet}");
    assert!(snippet.contains("Authorization: Bearer YOUR_TOKEN_HERE"));
    assert!(snippet.contains("Content-Type: application/json"));
    assert!(snippet.contains("-d '{"), "snippet must carry a JSON body: {snippet}");
}

#[tokio::test]
async fn validation_failure_never_reaches_the_store() {
    let state = state_with_spec(&users_spec()).await;

    let err = dispatch_tool(
        &state,
        "searchEndpoints",
        &json!({"keywords": "", "page": 1, "perPage": 20}),
        &RequestId::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.error_code(), -32602);
    let rpc = err.to_json_rpc_error();
    assert_eq!(rpc.data.unwrap()["parameter"], "keywords");

    // The monitor recorded a validation error, not a store failure, and
    // the breaker saw nothing.
    let summary = state.monitor.summary();
    let search = summary.iter().find(|t| t.tool == "searchEndpoints").unwrap();
    assert_eq!(search.errors, 1);
    assert_eq!(search.error_kinds.get("ValidationError"), Some(&1));
    assert_eq!(
        state.breaker.state(),
        apiscope::mcp::resilience::BreakerState::Closed
    );
}

#[tokio::test]
async fn open_breaker_rejects_with_retry_after() {
    let state = state_with_spec(&users_spec()).await;
    for _ in 0..state.config.resilience.breaker_failure_threshold {
        state.breaker.record_failure();
    }

    let err = dispatch_tool(
        &state,
        "searchEndpoints",
        &json!({"keywords": "users"}),
        &RequestId::new(),
    )
    .await
    .unwrap_err();

    let McpError::ServiceUnavailable { retry_after_seconds, .. } = &err else {
        panic!("expected ServiceUnavailable, got {err:?}");
    };
    assert!(*retry_after_seconds >= 1);
    assert_eq!(err.error_code(), -32603);
}

#[tokio::test]
async fn schema_round_trip_without_resolution() {
    let state = state_with_spec(&users_spec()).await;

    let result = dispatch_tool(
        &state,
        "getSchema",
        &json!({"componentName": "User", "resolveDependencies": false}),
        &RequestId::new(),
    )
    .await
    .unwrap();

    let schema = &result["schema"];
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["required"], json!(["id", "email"]));
    let properties = schema["properties"].as_object().unwrap();
    assert_eq!(properties.len(), 3);
    // Property order survives ingest, storage, and resolution.
    let keys: Vec<&String> = properties.keys().collect();
    assert_eq!(keys, ["id", "email", "name"]);
}

#[tokio::test]
async fn fuzzy_and_field_queries_work_end_to_end() {
    let state = state_with_spec(&users_spec()).await;

    let fuzzy = dispatch_tool(
        &state,
        "searchEndpoints",
        &json!({"keywords": "usres~"}),
        &RequestId::new(),
    )
    .await
    .unwrap();
    assert_eq!(fuzzy["pagination"]["total"], 3);

    let scoped = dispatch_tool(
        &state,
        "searchEndpoints",
        &json!({"keywords": "users method:GET"}),
        &RequestId::new(),
    )
    .await
    .unwrap();
    assert_eq!(scoped["pagination"]["total"], 2);
}
