//! # Rate Limit Middleware
//!
//! Admission check applied before any business processing. Endpoint classes
//! carry distinct quotas: a tight per-minute policy for event ingestion, a
//! looser per-hour one for management routes. Rejections answer 429 with the
//! standard rate-limit headers; admitted requests get the decision attached
//! as an extension so handlers can surface the quota metadata.

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use tracing::debug;

use crate::rate_limit::RateLimitPolicy;
use crate::web::errors::{apply_rate_limit_headers, ApiError};
use crate::web::state::AppState;

/// Endpoint classes with independent admission policies
#[derive(Debug, Clone, Copy)]
pub enum EndpointClass {
    Events,
    Management,
}

impl EndpointClass {
    fn key_prefix(&self) -> &'static str {
        match self {
            EndpointClass::Events => "events",
            EndpointClass::Management => "mgmt",
        }
    }

    fn rejection_message(&self) -> &'static str {
        match self {
            EndpointClass::Events => "Event rate limit exceeded, slow down",
            EndpointClass::Management => "Management API rate limit exceeded",
        }
    }

    fn policy(&self, state: &AppState) -> RateLimitPolicy {
        match self {
            EndpointClass::Events => state.config.rate_limits.events,
            EndpointClass::Management => state.config.rate_limits.management,
        }
    }
}

/// Admission middleware for the ingestion endpoint
pub async fn events_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    check_admission(state, request, next, EndpointClass::Events).await
}

/// Admission middleware for management endpoints
pub async fn management_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    check_admission(state, request, next, EndpointClass::Management).await
}

async fn check_admission(
    state: AppState,
    mut request: Request,
    next: Next,
    class: EndpointClass,
) -> Response {
    if !state.config.rate_limits.enabled {
        return next.run(request).await;
    }

    let identity = client_identity(&request);
    let key = format!("{}:{}", class.key_prefix(), identity);
    let policy = class.policy(&state);

    let decision = state
        .limiter
        .check_and_increment(&identity, &key, policy)
        .await;

    if !decision.allowed {
        debug!(
            identity = %identity,
            key = %key,
            count = decision.count,
            limit = decision.limit,
            "Request rejected by rate limiter"
        );
        return ApiError::rate_limited(class.rejection_message(), decision).into_response();
    }

    request.extensions_mut().insert(decision);

    let mut response = next.run(request).await;
    apply_rate_limit_headers(&mut response, &decision);
    response
}

/// Client identity for shard selection and quota keys: the first
/// `X-Forwarded-For` hop when present (the relay normally sits behind a
/// proxy), else the peer address, else unknown (which lands on the global
/// shard).
fn client_identity(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_header(name: &str, value: &str) -> Request {
        axum::http::Request::builder()
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_identity_prefers_forwarded_header() {
        let request = request_with_header("x-forwarded-for", "10.1.2.3, 172.16.0.1");
        assert_eq!(client_identity(&request), "10.1.2.3");
    }

    #[test]
    fn test_identity_falls_back_to_connect_info() {
        let mut request = axum::http::Request::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 7], 40000))));
        assert_eq!(client_identity(&request), "192.168.1.7");
    }

    #[test]
    fn test_identity_unknown_when_nothing_available() {
        let request = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_identity(&request), "unknown");
    }
}
