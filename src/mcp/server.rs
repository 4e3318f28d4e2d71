//! MCP stdio server
//!
//! Newline-delimited JSON-RPC over stdin/stdout. Requests are handled
//! concurrently; responses serialize through one writer lock. Shutdown
//! drains in-flight requests for a grace period, then fails the rest with
//! ServiceUnavailable.

use crate::errors::Result;
use crate::mcp::error::McpError;
use crate::mcp::protocol::{JsonRpcId, JsonRpcRequest, JsonRpcResponse};
use crate::mcp::{McpHandler, ServerState};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Run the stdio server until EOF or shutdown.
pub async fn run_stdio(state: Arc<ServerState>) -> Result<()> {
    let handler = Arc::new(McpHandler::new(state.clone()));
    let stdout = Arc::new(tokio::sync::Mutex::new(tokio::io::stdout()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks: JoinSet<()> = JoinSet::new();
    let in_flight: Arc<DashMap<u64, Option<JsonRpcId>>> = Arc::new(DashMap::new());
    let mut task_sequence: u64 = 0;

    info!(server = %state.config.server.name, "MCP stdio server ready");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                info!("Shutdown requested; draining in-flight requests");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed; shutting down");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let request: JsonRpcRequest = match serde_json::from_str(&line) {
                    Ok(request) => request,
                    Err(e) => {
                        let response = JsonRpcResponse::failure(
                            None,
                            McpError::ParseError(e.to_string()).into(),
                        );
                        write_response(&stdout, &response).await;
                        continue;
                    }
                };

                task_sequence += 1;
                let task_id = task_sequence;
                in_flight.insert(task_id, request.id.clone());

                let handler = Arc::clone(&handler);
                let stdout = Arc::clone(&stdout);
                let in_flight = Arc::clone(&in_flight);
                tasks.spawn(async move {
                    if let Some(response) = handler.handle(request).await {
                        write_response(&stdout, &response).await;
                    }
                    in_flight.remove(&task_id);
                });
            }
        }
    }

    // Grace period for in-flight requests; whatever remains is failed.
    let grace = state.config.server.shutdown_grace();
    let drained = tokio::time::timeout(grace, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            remaining = in_flight.len(),
            grace_seconds = grace.as_secs(),
            "Grace period elapsed; failing remaining requests"
        );
        tasks.abort_all();
        for entry in in_flight.iter() {
            let response = JsonRpcResponse::failure(
                entry.value().clone(),
                McpError::ServiceUnavailable {
                    message: "Server is shutting down".to_string(),
                    retry_after_seconds: 5,
                }
                .into(),
            );
            write_response(&stdout, &response).await;
        }
    }

    info!("MCP stdio server stopped");
    Ok(())
}

async fn write_response(
    stdout: &Arc<tokio::sync::Mutex<tokio::io::Stdout>>,
    response: &JsonRpcResponse,
) {
    let Ok(serialized) = serde_json::to_string(response) else {
        warn!("Failed to serialize JSON-RPC response");
        return;
    };
    let mut writer = stdout.lock().await;
    if let Err(e) = writer.write_all(serialized.as_bytes()).await {
        warn!(error = %e, "Failed to write response");
        return;
    }
    let _ = writer.write_all(b"\n").await;
    let _ = writer.flush().await;
}
