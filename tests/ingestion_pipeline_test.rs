//! Delivery-path integration tests: ingestion through to sync-status
//! reporting, including breaker behavior across requests.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use beacon_relay::delivery::{
    CrmResponse, CrmTransport, InMemorySyncTracker, TransportError,
};
use beacon_relay::web::build_router;
use beacon_relay::web::state::AppState;
use beacon_relay::{DeliveryFailure, RelayConfig, TrackingEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct FixedTransport {
    status: u16,
    calls: AtomicUsize,
}

impl FixedTransport {
    fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CrmTransport for FixedTransport {
    async fn send(&self, _event: &TrackingEvent) -> Result<CrmResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CrmResponse {
            status: self.status,
            body: String::new(),
        })
    }
}

fn event_request() -> Request<Body> {
    let payload = serde_json::json!({
        "visitor_id": "v-123",
        "event": "form_submit",
        "properties": { "form": "signup" }
    });

    Request::builder()
        .method("POST")
        .uri("/v1/events")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "10.1.2.3")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

/// Spawned delivery runs concurrently with the response; poll the tracker
/// until the expected number of outcomes has been recorded.
async fn wait_for_records(tracker: &InMemorySyncTracker, expected: usize) {
    for _ in 0..200 {
        if tracker.len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "tracker never reached {expected} records (got {})",
        tracker.len()
    );
}

fn pipeline_config(failure_threshold: u32, max_retries: u32) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.circuit_breaker.failure_threshold = failure_threshold;
    config.circuit_breaker.reset_timeout_ms = 60_000;
    config.crm.max_retries = max_retries;
    config.crm.timeout_ms = 500;
    config.crm.initial_delay_ms = 1;
    config
}

#[tokio::test]
async fn test_successful_delivery_reported_to_tracker() {
    let transport = FixedTransport::new(200);
    let tracker = Arc::new(InMemorySyncTracker::new());
    let state = AppState::new(pipeline_config(5, 2), transport.clone(), tracker.clone());
    let router = build_router(state);

    let response = router.oneshot(event_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    wait_for_records(&tracker, 1).await;

    let records = tracker.records();
    let (_, outcome) = &records[0];
    assert!(outcome.success);
    assert_eq!(outcome.status, Some(200));
    assert_eq!(outcome.attempts, 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delivery_failure_never_reaches_the_browser() {
    let transport = FixedTransport::new(503);
    let tracker = Arc::new(InMemorySyncTracker::new());
    let state = AppState::new(pipeline_config(5, 1), transport.clone(), tracker.clone());
    let router = build_router(state);

    // The browser still gets 202; the failure goes to the tracker only
    let response = router.oneshot(event_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    wait_for_records(&tracker, 1).await;

    let records = tracker.records();
    let (_, outcome) = &records[0];
    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(DeliveryFailure::ServerError));
    assert_eq!(outcome.attempts, 2);
}

#[tokio::test]
async fn test_open_breaker_rejects_later_deliveries_without_network_calls() {
    let transport = FixedTransport::new(503);
    let tracker = Arc::new(InMemorySyncTracker::new());
    let state = AppState::new(pipeline_config(1, 0), transport.clone(), tracker.clone());
    let router = build_router(state);

    // First delivery fails and opens the breaker (threshold 1)
    let _ = router.clone().oneshot(event_request()).await.unwrap();
    wait_for_records(&tracker, 1).await;
    assert_eq!(
        tracker.records()[0].1.failure,
        Some(DeliveryFailure::ServerError)
    );
    let calls_after_first = transport.calls.load(Ordering::SeqCst);

    // Second delivery is rejected by the breaker, no transport call made
    let _ = router.clone().oneshot(event_request()).await.unwrap();
    wait_for_records(&tracker, 2).await;

    let records = tracker.records();
    let (_, outcome) = &records[1];
    assert_eq!(outcome.failure, Some(DeliveryFailure::BreakerOpen));
    assert_eq!(outcome.attempts, 0);
    assert_eq!(transport.calls.load(Ordering::SeqCst), calls_after_first);
}

#[tokio::test]
async fn test_client_error_reported_without_retries() {
    let transport = FixedTransport::new(422);
    let tracker = Arc::new(InMemorySyncTracker::new());
    let state = AppState::new(pipeline_config(5, 3), transport.clone(), tracker.clone());
    let router = build_router(state);

    let response = router.oneshot(event_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    wait_for_records(&tracker, 1).await;

    let records = tracker.records();
    let (_, outcome) = &records[0];
    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(DeliveryFailure::ClientError));
    assert_eq!(outcome.status, Some(422));
    assert_eq!(
        transport.calls.load(Ordering::SeqCst),
        1,
        "4xx must not be retried"
    );
}
