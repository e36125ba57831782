//! # Health and Status Handlers
//!
//! `GET /health` answers liveness probes; `GET /v1/status` exposes the
//! breaker snapshot and admission quotas for operators.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::rate_limit::RateLimitPolicy;
use crate::resilience::CircuitBreakerMetrics;
use crate::web::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    status: String,
    timestamp: String,
    circuit_breaker: BreakerStatus,
    rate_limits: RateLimitStatus,
}

#[derive(Serialize)]
pub struct BreakerStatus {
    component: String,
    #[serde(flatten)]
    metrics: CircuitBreakerMetrics,
}

#[derive(Serialize)]
pub struct RateLimitStatus {
    enabled: bool,
    events: RateLimitPolicy,
    management: RateLimitPolicy,
}

/// Basic health check endpoint: GET /health
pub async fn basic_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Service status endpoint: GET /v1/status
pub async fn service_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let breaker = state.relay.breaker();

    Json(StatusResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        circuit_breaker: BreakerStatus {
            component: breaker.name().to_string(),
            metrics: breaker.metrics(),
        },
        rate_limits: RateLimitStatus {
            enabled: state.config.rate_limits.enabled,
            events: state.config.rate_limits.events,
            management: state.config.rate_limits.management,
        },
    })
}
