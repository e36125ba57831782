//! # Sync Status Tracking
//!
//! The sync-status tracker is an external collaborator: it records per-event
//! delivery outcomes and decides whether and when to re-enqueue failed ones.
//! The relay only reports; it never re-enqueues on its own.

use super::DeliveryOutcome;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Receives the outcome of every delivery attempt
pub trait SyncStatusTracker: Send + Sync {
    fn record(&self, event_id: Uuid, outcome: &DeliveryOutcome);
}

/// Default tracker: structured log lines, for hosts that scrape logs into
/// their sync dashboard.
#[derive(Debug, Default, Clone)]
pub struct LoggingSyncTracker;

impl SyncStatusTracker for LoggingSyncTracker {
    fn record(&self, event_id: Uuid, outcome: &DeliveryOutcome) {
        if outcome.success {
            info!(
                event_id = %event_id,
                status = outcome.status,
                attempts = outcome.attempts,
                "Sync status: delivered"
            );
        } else {
            warn!(
                event_id = %event_id,
                failure = ?outcome.failure,
                status = outcome.status,
                attempts = outcome.attempts,
                breaker_state = ?outcome.breaker_state,
                "Sync status: delivery failed"
            );
        }
    }
}

/// Test tracker that retains every recorded outcome
#[derive(Debug, Default)]
pub struct InMemorySyncTracker {
    records: Mutex<Vec<(Uuid, DeliveryOutcome)>>,
}

impl InMemorySyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Uuid, DeliveryOutcome)> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl SyncStatusTracker for InMemorySyncTracker {
    fn record(&self, event_id: Uuid, outcome: &DeliveryOutcome) {
        self.records.lock().push((event_id, outcome.clone()));
    }
}
