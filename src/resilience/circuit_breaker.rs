//! # Circuit Breaker Implementation
//!
//! Prevents cascade failures when the CRM dependency degrades. Classic three
//! state machine: Closed (normal operation), Open (failing fast), and
//! Half-Open (testing recovery).
//!
//! State and counters live behind one mutex so every transition is observed
//! as a consistent unit: a failure count increment is never visible without
//! the state and reopen deadline that go with it.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - calls probe the dependency
    HalfOpen,
}

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,

    /// Time to wait in open state before attempting recovery
    pub reset_timeout: Duration,

    /// Number of consecutive successes in half-open state to close circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.reset_timeout.is_zero() {
            return Err("reset_timeout must be greater than 0".to_string());
        }

        if self.success_threshold == 0 {
            return Err("success_threshold must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation failed and was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Point-in-time view of a breaker for health endpoints
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub rejected_calls: u64,
    pub consecutive_failures: u32,
}

/// Mutable breaker state, guarded by the outer mutex.
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Consecutive failures observed in the current Closed/HalfOpen cycle
    failure_count: u32,
    /// Consecutive successes observed since entering HalfOpen
    success_count: u32,
    /// When the circuit last opened; reopen probes are allowed after
    /// `opened_at + reset_timeout`
    opened_at: Option<Instant>,

    total_calls: u64,
    total_successes: u64,
    total_failures: u64,
    rejected_calls: u64,
}

/// Named, process-lifetime circuit breaker guarding one dependency.
///
/// Constructed once at startup and shared by `Arc` into every call site. All
/// state mutation happens through [`CircuitBreaker::call`].
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Dependency name for logging and metrics
    name: String,

    config: CircuitBreakerConfig,

    inner: parking_lot::Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            success_threshold = config.success_threshold,
            "Circuit breaker initialized"
        );

        Self {
            name,
            config,
            inner: parking_lot::Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
                total_calls: 0,
                total_successes: 0,
                total_failures: 0,
                rejected_calls: 0,
            }),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// While Open and before the reset timeout elapses the operation is never
    /// invoked. The first call at or after the deadline moves the breaker to
    /// HalfOpen and probes the dependency. The underlying error is always
    /// propagated, never swallowed.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.begin_call() {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let result = operation().await;

        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Admission check plus the Open -> HalfOpen transition, as one critical
    /// section. Returns false when the call must fail fast.
    fn begin_call(&self) -> bool {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => {
                inner.total_calls += 1;
                true
            }
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed());
                let expired = elapsed.is_some_and(|e| e >= self.config.reset_timeout);

                if expired {
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    inner.total_calls += 1;
                    info!(
                        component = %self.name,
                        success_threshold = self.config.success_threshold,
                        "Circuit breaker half-open (testing recovery)"
                    );
                    true
                } else {
                    inner.rejected_calls += 1;
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_successes += 1;

        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.opened_at = None;
                    info!(
                        component = %self.name,
                        total_calls = inner.total_calls,
                        "Circuit breaker closed (recovered)"
                    );
                }
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late.
                warn!(component = %self.name, "Success recorded while circuit is open");
            }
        }

        debug!(component = %self.name, "Operation succeeded");
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.failure_count += 1;

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    self.open_locked(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure during recovery probing reopens immediately
                self.open_locked(&mut inner);
            }
            CircuitState::Open => {
                // Late failure from an already-admitted call
            }
        }
    }

    fn open_locked(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.success_count = 0;

        error!(
            component = %self.name,
            consecutive_failures = inner.failure_count,
            failure_threshold = self.config.failure_threshold,
            reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
            "Circuit breaker opened (failing fast)"
        );
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            total_calls: inner.total_calls,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            rejected_calls: inner.rejected_calls,
            consecutive_failures: inner.failure_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn breaker(failure_threshold: u32, reset_timeout: Duration, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "crm",
            CircuitBreakerConfig {
                failure_threshold,
                reset_timeout,
                success_threshold,
            },
        )
    }

    #[tokio::test]
    async fn test_normal_operation() {
        let circuit = breaker(3, Duration::from_millis(100), 2);

        assert_eq!(circuit.state(), CircuitState::Closed);

        let result = circuit.call(|| async { Ok::<_, String>("success") }).await;
        assert!(result.is_ok());

        let metrics = circuit.metrics();
        assert_eq!(metrics.total_calls, 1);
        assert_eq!(metrics.total_successes, 1);
        assert_eq!(metrics.total_failures, 0);
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let circuit = breaker(2, Duration::from_millis(100), 2);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Closed);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_fail_fast_does_not_invoke_operation() {
        let circuit = breaker(2, Duration::from_secs(5), 2);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        let invoked = Arc::new(AtomicUsize::new(0));
        let invoked_clone = invoked.clone();
        let result = circuit
            .call(|| {
                let invoked = invoked_clone.clone();
                async move {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("should not execute")
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(CircuitBreakerError::CircuitOpen { .. })
        ));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(circuit.metrics().rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count_while_closed() {
        let circuit = breaker(2, Duration::from_millis(100), 2);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        let _ = circuit.call(|| async { Ok::<_, String>("ok") }).await;
        // Failure streak broken; one more failure must not open the circuit
        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_recovery_requires_success_threshold() {
        let circuit = breaker(1, Duration::from_millis(50), 2);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        sleep(Duration::from_millis(60)).await;

        // First probe succeeds but one success is not enough to close
        let result = circuit.call(|| async { Ok::<_, String>("probe") }).await;
        assert!(result.is_ok());
        assert_eq!(circuit.state(), CircuitState::HalfOpen);

        // Second consecutive success closes and zeroes the counters
        let result = circuit.call(|| async { Ok::<_, String>("probe") }).await;
        assert!(result.is_ok());
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.metrics().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_immediately() {
        let circuit = breaker(1, Duration::from_millis(50), 2);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        sleep(Duration::from_millis(60)).await;

        let _ = circuit.call(|| async { Err::<String, _>("still down") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        // And the new open period rejects again
        let result = circuit.call(|| async { Ok::<_, String>("nope") }).await;
        assert!(matches!(
            result,
            Err(CircuitBreakerError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_then_recovery_scenario() {
        // failure_threshold=2, reset_timeout=1s: calls 1-2 fail -> Open;
        // call 3 at t+500ms fails fast; call 4 at t+1001ms probes; call 5 closes.
        let circuit = breaker(2, Duration::from_millis(1000), 2);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        sleep(Duration::from_millis(500)).await;
        let invoked = Arc::new(AtomicUsize::new(0));
        let invoked_clone = invoked.clone();
        let result = circuit
            .call(|| {
                let invoked = invoked_clone.clone();
                async move {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("early")
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(invoked.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(501)).await;
        let invoked_clone = invoked.clone();
        let result = circuit
            .call(|| {
                let invoked = invoked_clone.clone();
                async move {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("probe")
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
        assert_eq!(circuit.state(), CircuitState::HalfOpen);

        let result = circuit.call(|| async { Ok::<_, String>("probe") }).await;
        assert!(result.is_ok());
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn test_config_validation() {
        assert!(CircuitBreakerConfig::default().validate().is_ok());

        let invalid = CircuitBreakerConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        assert!(invalid.validate().is_err());

        let invalid = CircuitBreakerConfig {
            reset_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(invalid.validate().is_err());

        let invalid = CircuitBreakerConfig {
            success_threshold: 0,
            ..Default::default()
        };
        assert!(invalid.validate().is_err());
    }
}
