//! # Structured Error Handling
//!
//! Crate-wide error type for the paths that actually fail upward: loading
//! configuration and running the HTTP server. Component-local error types
//! (circuit breaker, retry client, shard actors) live next to their
//! components; the admission and delivery paths absorb their failures by
//! design (fail-open, [`DeliveryOutcome`](crate::delivery::DeliveryOutcome))
//! and never surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("HTTP server error: {0}")]
    HttpError(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl From<config::ConfigError> for RelayError {
    fn from(err: config::ConfigError) -> Self {
        RelayError::ConfigurationError(err.to_string())
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::HttpError(err.to_string())
    }
}
