//! # Tool Performance Monitoring
//!
//! Per-tool call counts, error counts, response-time samples with p95, and
//! an error-kind histogram. Exceeding a per-tool response-time threshold
//! emits an alert carrying the request id.

use crate::domain::RequestId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::warn;

/// Retained response-time samples per tool.
const SAMPLE_WINDOW: usize = 1024;

/// Per-tool latency thresholds; exceeding one raises an alert.
pub fn threshold_for(tool: &str) -> Option<Duration> {
    match tool {
        "searchEndpoints" => Some(Duration::from_millis(200)),
        "getSchema" => Some(Duration::from_millis(500)),
        "getExample" => Some(Duration::from_secs(2)),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct ToolStats {
    calls: u64,
    errors: u64,
    durations_ms: VecDeque<u64>,
    error_kinds: BTreeMap<String, u64>,
    threshold_breaches: u64,
}

/// Serializable snapshot of one tool's statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetricsSummary {
    pub tool: String,
    pub calls: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub p95_ms: u64,
    pub average_ms: u64,
    pub error_kinds: BTreeMap<String, u64>,
    pub threshold_breaches: u64,
}

/// Process-wide tool monitor. Rows are per-tool and independently locked.
#[derive(Debug, Default)]
pub struct ToolMonitor {
    tools: DashMap<String, ToolStats>,
}

impl ToolMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished call. `error_kind` is `None` on success.
    pub fn record(
        &self,
        tool: &str,
        request_id: &RequestId,
        duration: Duration,
        error_kind: Option<&str>,
    ) {
        let duration_ms = duration.as_millis() as u64;
        let mut stats = self.tools.entry(tool.to_string()).or_default();
        stats.calls += 1;
        if stats.durations_ms.len() >= SAMPLE_WINDOW {
            stats.durations_ms.pop_front();
        }
        stats.durations_ms.push_back(duration_ms);
        if let Some(kind) = error_kind {
            stats.errors += 1;
            *stats.error_kinds.entry(kind.to_string()).or_default() += 1;
        }

        metrics::counter!("tool_calls_total", "tool" => tool.to_string()).increment(1);
        metrics::histogram!("tool_duration_ms", "tool" => tool.to_string())
            .record(duration_ms as f64);
        if error_kind.is_some() {
            metrics::counter!("tool_errors_total", "tool" => tool.to_string()).increment(1);
        }

        if let Some(threshold) = threshold_for(tool) {
            if duration > threshold {
                stats.threshold_breaches += 1;
                warn!(
                    tool,
                    request_id = %request_id,
                    duration_ms,
                    threshold_ms = threshold.as_millis() as u64,
                    "Tool response time threshold exceeded"
                );
                metrics::counter!("tool_threshold_exceeded_total", "tool" => tool.to_string())
                    .increment(1);
            }
        }
    }

    /// Snapshot of every tool's statistics, ordered by tool name.
    pub fn summary(&self) -> Vec<ToolMetricsSummary> {
        let mut summaries: Vec<ToolMetricsSummary> = self
            .tools
            .iter()
            .map(|entry| {
                let stats = entry.value();
                ToolMetricsSummary {
                    tool: entry.key().clone(),
                    calls: stats.calls,
                    errors: stats.errors,
                    error_rate: if stats.calls > 0 {
                        stats.errors as f64 / stats.calls as f64
                    } else {
                        0.0
                    },
                    p95_ms: percentile(&stats.durations_ms, 95),
                    average_ms: average(&stats.durations_ms),
                    error_kinds: stats.error_kinds.clone(),
                    threshold_breaches: stats.threshold_breaches,
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.tool.cmp(&b.tool));
        summaries
    }
}

fn percentile(samples: &VecDeque<u64>, percentile: usize) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    let mut sorted: Vec<u64> = samples.iter().copied().collect();
    sorted.sort_unstable();
    let rank = (percentile * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn average(samples: &VecDeque<u64>) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    samples.iter().sum::<u64>() / samples.len() as u64
}
