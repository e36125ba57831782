//! # Event Ingestion Handler
//!
//! `POST /v1/events` accepts a tracking event that already passed admission.
//! The browser gets 202 immediately; delivery to the CRM runs on a spawned
//! task and reports its outcome to the sync-status tracker, never back to
//! this response.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::delivery::TrackingEvent;
use crate::rate_limit::RateLimitDecision;
use crate::web::errors::ApiError;
use crate::web::state::AppState;

#[derive(Serialize)]
pub struct IngestResponse {
    success: bool,
    event_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit: Option<RateLimitInfo>,
}

/// Quota metadata surfaced to well-behaved clients
#[derive(Serialize)]
pub struct RateLimitInfo {
    remaining: u32,
    reset_time: i64,
}

/// Ingest one tracking event: POST /v1/events
pub async fn ingest_event(
    State(state): State<AppState>,
    decision: Option<Extension<RateLimitDecision>>,
    Json(event): Json<TrackingEvent>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    if event.visitor_id.is_empty() {
        return Err(ApiError::bad_request("visitor_id must not be empty"));
    }

    if event.event.is_empty() {
        return Err(ApiError::bad_request("event name must not be empty"));
    }

    let event_id = event.event_id;
    debug!(event_id = %event_id, event = %event.event, "Event accepted for delivery");

    let relay = state.relay.clone();
    let tracker = state.tracker.clone();
    tokio::spawn(async move {
        let outcome = relay.deliver(&event).await;
        tracker.record(event_id, &outcome);
    });

    let rate_limit = decision.map(|Extension(decision)| RateLimitInfo {
        remaining: decision.remaining,
        reset_time: decision.reset_time,
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            success: true,
            event_id,
            rate_limit,
        }),
    ))
}
