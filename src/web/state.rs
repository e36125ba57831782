//! # Web Application State
//!
//! Shared state for the HTTP surface. Everything inside is `Arc`-backed so
//! the state clones cheaply into handlers and middleware. The circuit
//! breaker is constructed exactly once here and threaded into the relay by
//! shared reference.

use crate::config::RelayConfig;
use crate::delivery::{
    CrmRelay, CrmTransport, HttpCrmClient, LoggingSyncTracker, SyncStatusTracker,
};
use crate::error::Result;
use crate::rate_limit::ShardedRateLimiter;
use crate::resilience::CircuitBreaker;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub limiter: ShardedRateLimiter,
    pub relay: Arc<CrmRelay>,
    pub tracker: Arc<dyn SyncStatusTracker>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    /// Assemble state from parts. Used directly by tests that inject a fake
    /// transport or tracker.
    pub fn new(
        config: RelayConfig,
        transport: Arc<dyn CrmTransport>,
        tracker: Arc<dyn SyncStatusTracker>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new("crm", config.circuit_breaker_config()));
        let relay = Arc::new(CrmRelay::new(transport, breaker, config.retry_policy()));

        Self {
            limiter: ShardedRateLimiter::new(),
            relay,
            tracker,
            config: Arc::new(config),
        }
    }

    /// Production wiring: reqwest transport against the configured CRM
    /// endpoint, log-based sync tracking.
    pub fn from_config(config: RelayConfig) -> Result<Self> {
        let transport = Arc::new(HttpCrmClient::new(&config.crm)?);
        Ok(Self::new(config, transport, Arc::new(LoggingSyncTracker)))
    }
}
