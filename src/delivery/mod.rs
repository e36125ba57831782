//! # Outbound Delivery
//!
//! Relays qualifying tracking events to the external CRM. The path is
//! `CircuitBreaker(RetryingClient(transport.send))`: retries absorb transient
//! failures, the breaker stops hammering a dependency that stays down, and
//! every delivery produces a [`DeliveryOutcome`] for the sync-status tracker.
//! Delivery failures are reported, never thrown back to the original HTTP
//! request — the browser already got its response.

pub mod relay;
pub mod tracker;
pub mod transport;

pub use relay::CrmRelay;
pub use tracker::{InMemorySyncTracker, LoggingSyncTracker, SyncStatusTracker};
pub use transport::{CrmResponse, CrmTransport, HttpCrmClient, TransportError};

use crate::resilience::CircuitState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A validated browser tracking event, as handed over by the ingestion
/// surface. Field mapping to CRM person records happens on the CRM side of
/// the wire; the relay treats the payload as opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    #[serde(default = "Uuid::new_v4")]
    pub event_id: Uuid,
    pub visitor_id: String,
    pub event: String,
    #[serde(default)]
    pub properties: serde_json::Value,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

/// Failure classes the sync-status tracker can base retry/defer policy on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFailure {
    /// Breaker rejected the call; no network attempt was made
    BreakerOpen,
    /// Every attempt hit the per-attempt deadline
    Timeout,
    /// Transport-level failure (DNS, connect, TLS, mid-body disconnect)
    TransportError,
    /// CRM kept answering 5xx through the whole retry budget
    ServerError,
    /// CRM rejected the request outright (4xx); retrying is pointless
    ClientError,
}

/// Result of one delivery attempt, handed to the sync-status tracker
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    /// Last HTTP status received, when any response made it back
    pub status: Option<u16>,
    pub failure: Option<DeliveryFailure>,
    /// Transport attempts actually made (0 when the breaker rejected)
    pub attempts: u32,
    /// Breaker state observed right after the call completed
    pub breaker_state: CircuitState,
}
