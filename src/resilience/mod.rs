//! # Resilience Subsystem
//!
//! Fault-isolation primitives for the outbound delivery path:
//!
//! - [`CircuitBreaker`]: named per-dependency failure tracking with fail-fast
//!   behavior while the dependency is judged unhealthy
//! - [`RetryingClient`]: per-attempt timeouts with exponential backoff between
//!   retryable failures
//!
//! Delivery composes them as `breaker.call(|| retrying.call(|| send()))`; the
//! breaker sees one logical outcome per delivery, after retries are spent.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerMetrics, CircuitState,
};
pub use retry::{CallError, CallOutcome, RetryPolicy, RetryingClient};
