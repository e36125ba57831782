//! # Beacon Relay
//!
//! Ingestion relay for browser tracking events: admits inbound requests
//! through a sharded fixed-window rate limiter, then delivers qualifying
//! events to an external CRM behind a circuit breaker and a timeout/backoff
//! retrying client.
//!
//! ## Architecture
//!
//! ```text
//! browser -> POST /v1/events
//!              -> rate limit middleware (sharded fixed-window admission)
//!              -> 202 Accepted
//!              -> spawned delivery task
//!                   -> CircuitBreaker(RetryingClient(HTTP call to CRM))
//!                   -> DeliveryOutcome -> sync-status tracker
//! ```
//!
//! ## Module Organization
//!
//! - [`rate_limit`] - Sharded fixed-window admission control
//! - [`resilience`] - Circuit breaker and retrying call wrapper
//! - [`delivery`] - Outbound CRM relay and outcome reporting
//! - [`web`] - axum HTTP surface (handlers, middleware, state)
//! - [`config`] - Layered configuration management
//! - [`error`] - Structured error handling
//!
//! ## Design Constraints
//!
//! - Rate limiting is fixed-window by policy: boundary bursts up to twice
//!   the nominal limit are accepted behavior.
//! - The rate limiter fails open when its shard backend is unreachable;
//!   ingestion availability beats strict quota enforcement.
//! - Breaker state is per-process; a fleet of N instances tolerates up to
//!   `N * (failure_threshold - 1)` failures before any one instance opens.

pub mod config;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod resilience;
pub mod web;

pub use config::RelayConfig;
pub use delivery::{CrmRelay, DeliveryFailure, DeliveryOutcome, TrackingEvent};
pub use error::{RelayError, Result};
pub use rate_limit::{RateLimitDecision, RateLimitPolicy, ShardedRateLimiter};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryPolicy, RetryingClient};
