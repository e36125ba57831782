//! # API Error Responses
//!
//! Error type for the HTTP surface. Admission rejections carry the standard
//! rate-limit headers plus a `retryAfter` hint; everything else is a plain
//! JSON error envelope.

use crate::rate_limit::RateLimitDecision;
use axum::http::{header::HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    RateLimited {
        message: String,
        decision: RateLimitDecision,
    },
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn rate_limited(message: impl Into<String>, decision: RateLimitDecision) -> Self {
        ApiError::RateLimited {
            message: message.into(),
            decision,
        }
    }
}

/// Set the informational rate-limit headers on any response
pub fn apply_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert(
        X_RATELIMIT_LIMIT,
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        X_RATELIMIT_REMAINING,
        HeaderValue::from(decision.remaining),
    );
    if let Ok(value) = HeaderValue::from_str(&decision.reset_time.to_string()) {
        headers.insert(X_RATELIMIT_RESET, value);
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": message })),
            )
                .into_response(),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": message })),
            )
                .into_response(),
            ApiError::RateLimited { message, decision } => {
                let body = json!({
                    "success": false,
                    "error": message,
                    "retryAfter": decision.retry_after_seconds(),
                });
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                apply_rate_limit_headers(&mut response, &decision);
                response
            }
        }
    }
}
