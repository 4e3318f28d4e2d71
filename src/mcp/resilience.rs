//! # Resilience Envelope
//!
//! The fixed middleware chain wrapping every tool invocation: timeout →
//! circuit breaker → retry with exponential backoff → bounded concurrency.
//! The circuit breaker guards the store; only transient failures trip it
//! or are retried.

use crate::config::ResilienceConfig;
use crate::mcp::error::McpError;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    first_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    probe_successes: u32,
    probes_admitted: u32,
}

/// Circuit breaker: CLOSED → OPEN after N consecutive failures within the
/// window; OPEN rejects immediately with a retry-after hint; after the
/// cooldown HALF_OPEN admits a small probe batch; S consecutive successes
/// close it again, one failure reopens it.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    window: Duration,
    cooldown: Duration,
    probe_target: u32,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: &ResilienceConfig) -> Self {
        Self {
            failure_threshold: config.breaker_failure_threshold,
            window: config.breaker_window(),
            cooldown: config.breaker_cooldown(),
            probe_target: config.breaker_probe_successes,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                first_failure_at: None,
                opened_at: None,
                probe_successes: 0,
                probes_admitted: 0,
            }),
        }
    }

    /// Admission check, run before any store work. Transitions OPEN →
    /// HALF_OPEN once the cooldown has passed.
    pub fn check(&self) -> Result<(), McpError> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if elapsed >= self.cooldown {
                    debug!("Circuit breaker cooldown elapsed; admitting probes");
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_successes = 0;
                    inner.probes_admitted = 1;
                    metrics::gauge!("breaker_state").set(1.0);
                    Ok(())
                } else {
                    let remaining = self.cooldown.saturating_sub(elapsed);
                    Err(McpError::ServiceUnavailable {
                        message: "Circuit breaker is open".to_string(),
                        retry_after_seconds: remaining.as_secs().max(1),
                    })
                }
            }
            BreakerState::HalfOpen => {
                if inner.probes_admitted < self.probe_target {
                    inner.probes_admitted += 1;
                    Ok(())
                } else {
                    Err(McpError::ServiceUnavailable {
                        message: "Circuit breaker is probing".to_string(),
                        retry_after_seconds: 1,
                    })
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.probe_target {
                    debug!("Circuit breaker closed after successful probes");
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.first_failure_at = None;
                    inner.opened_at = None;
                    metrics::gauge!("breaker_state").set(0.0);
                }
            }
            _ => {
                inner.consecutive_failures = 0;
                inner.first_failure_at = None;
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                warn!("Circuit breaker probe failed; reopening");
                self.open(&mut inner);
            }
            BreakerState::Closed => {
                let now = Instant::now();
                // Failures older than the window start a fresh streak.
                let within_window = inner
                    .first_failure_at
                    .is_some_and(|first| now.duration_since(first) <= self.window);
                if within_window {
                    inner.consecutive_failures += 1;
                } else {
                    inner.consecutive_failures = 1;
                    inner.first_failure_at = Some(now);
                }
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "Circuit breaker opened after consecutive failures"
                    );
                    self.open(&mut inner);
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(Instant::now());
        inner.probe_successes = 0;
        inner.probes_admitted = 0;
        metrics::gauge!("breaker_state").set(2.0);
        metrics::counter!("breaker_opened_total").increment(1);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Counted resource pool bounding concurrent tool executions.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ResourcePool {
    pub fn new(limit: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(limit)), limit }
    }

    /// Take a slot without waiting; overflow surfaces ResourceExhausted.
    pub fn try_acquire(&self) -> Result<tokio::sync::OwnedSemaphorePermit, McpError> {
        self.semaphore.clone().try_acquire_owned().map_err(|_| McpError::ResourceExhausted {
            resource: "tool_executions".to_string(),
            current: self.limit,
            limit: self.limit,
            retry_after_seconds: 1,
        })
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Retry policy for one tool.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ResilienceConfig, max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
        }
    }

    /// Exponential backoff (factor 2), capped at `max_delay`.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        exponential.min(self.max_delay)
    }
}

/// Retry a fallible operation for transient failures only.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut run: F,
) -> Result<T, McpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, McpError>>,
{
    let mut attempt = 0;
    loop {
        match run().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure; retrying"
                );
                metrics::counter!("tool_retries_total", "tool" => operation.to_string())
                    .increment(1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Bound a future by a timeout, surfacing DatabaseTimeout on expiry.
pub async fn with_timeout<T, Fut>(
    timeout: Duration,
    operation: &str,
    future: Fut,
) -> Result<T, McpError>
where
    Fut: Future<Output = Result<T, McpError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(McpError::DatabaseTimeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Run one tool execution through the full envelope: timeout, circuit
/// breaker, retry, concurrency cap.
pub async fn execute_with_envelope<T, F, Fut>(
    breaker: &CircuitBreaker,
    pool: &ResourcePool,
    policy: RetryPolicy,
    timeout: Duration,
    tool: &str,
    run: F,
) -> Result<T, McpError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, McpError>>,
{
    breaker.check()?;

    let run_ref = &run;
    let pool_ref = pool;
    let result = with_timeout(timeout, tool, async {
        retry_with_backoff(policy, tool, move || async move {
            let _permit = pool_ref.try_acquire()?;
            run_ref().await
        })
        .await
    })
    .await;

    match &result {
        Ok(_) => breaker.record_success(),
        Err(error) if error.is_transient() => breaker.record_failure(),
        Err(_) => {}
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> ResilienceConfig {
        ResilienceConfig {
            breaker_failure_threshold: 3,
            breaker_window_seconds: 60,
            breaker_cooldown_seconds: 1,
            breaker_probe_successes: 2,
            retry_base_delay_ms: 1,
            retry_max_delay_seconds: 1,
            ..ResilienceConfig::default()
        }
    }

    fn transient() -> McpError {
        McpError::DatabaseConnection("down".to_string())
    }

    #[test]
    fn test_breaker_opens_after_threshold() {
        let breaker = CircuitBreaker::new(&fast_config());
        assert_eq!(breaker.state(), BreakerState::Closed);

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        let err = breaker.check().unwrap_err();
        assert!(matches!(err, McpError::ServiceUnavailable { .. }));
    }

    #[test]
    fn test_breaker_success_resets_streak() {
        let breaker = CircuitBreaker::new(&fast_config());
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_breaker_recovery_cycle() {
        let breaker = CircuitBreaker::new(&fast_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.check().is_err());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        // Cooldown elapsed: probes are admitted.
        assert!(breaker.check().is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_breaker_probe_failure_reopens() {
        let breaker = CircuitBreaker::new(&fast_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(breaker.check().is_ok());
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };

        let result = retry_with_backoff(policy, "test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(transient()) } else { Ok(42) } }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_non_transient() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };

        let result: Result<i32, McpError> = retry_with_backoff(policy, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(McpError::ToolNotFound("x".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };

        let result: Result<i32, McpError> = retry_with_backoff(policy, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(30), Duration::from_secs(60));
    }

    #[test]
    fn test_resource_pool_overflow() {
        let pool = ResourcePool::new(2);
        let first = pool.try_acquire().unwrap();
        let _second = pool.try_acquire().unwrap();
        let overflow = pool.try_acquire();
        assert!(matches!(overflow, Err(McpError::ResourceExhausted { .. })));

        drop(first);
        assert!(pool.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_timeout_surfaces_database_timeout() {
        let result: Result<(), McpError> =
            with_timeout(Duration::from_millis(10), "slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(McpError::DatabaseTimeout { .. })));
    }

    #[tokio::test]
    async fn test_envelope_rejects_when_open_without_running() {
        let breaker = CircuitBreaker::new(&fast_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        let pool = ResourcePool::new(4);
        let ran = AtomicU32::new(0);

        let result: Result<(), McpError> = execute_with_envelope(
            &breaker,
            &pool,
            RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(10),
            },
            Duration::from_secs(1),
            "test",
            || {
                ran.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

        assert!(matches!(result, Err(McpError::ServiceUnavailable { .. })));
        assert_eq!(ran.load(Ordering::SeqCst), 0, "tool body must not run while open");
    }
}
