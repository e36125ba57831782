//! # HTTP Surface
//!
//! axum router for the inbound path. Admission (rate limiting) runs as
//! middleware ahead of every handler; the ingestion route and the management
//! routes carry independent quotas.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod state;

use crate::error::{RelayError, Result};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the application router with per-class admission middleware
pub fn build_router(state: AppState) -> Router {
    let events = Router::new()
        .route("/v1/events", post(handlers::events::ingest_event))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::events_rate_limit,
        ));

    let management = Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route("/v1/status", get(handlers::health::service_status))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::management_rate_limit,
        ));

    Router::new()
        .merge(events)
        .merge(management)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.bind_address, state.config.server.port
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "Ingestion relay listening");

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| RelayError::HttpError(e.to_string()))
}
