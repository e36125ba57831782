//! # CRM Transport
//!
//! The raw HTTP call to the CRM, behind a trait so the resilience layer and
//! its tests never depend on a live endpoint. Timeouts are owned by the
//! retrying client, not the transport.

use super::TrackingEvent;
use crate::config::CrmConfig;
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use tracing::debug;

/// Response from one CRM call. Kept deliberately small: status plus body
/// text, enough for classification and diagnostics.
#[derive(Debug, Clone)]
pub struct CrmResponse {
    pub status: u16,
    pub body: String,
}

impl CrmResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Transport-level failure: the request never produced an HTTP response
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP transport failure: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Connection failure: {0}")]
    Connection(String),
}

/// One asynchronous CRM call. Implementations must be cancellation-safe:
/// a dropped future must leave no effect the caller could double-count.
#[async_trait]
pub trait CrmTransport: Send + Sync {
    async fn send(&self, event: &TrackingEvent) -> std::result::Result<CrmResponse, TransportError>;
}

/// Production transport: POSTs the event as JSON to the configured CRM
/// endpoint, with optional bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpCrmClient {
    http: reqwest::Client,
    endpoint_url: String,
    api_key: Option<String>,
}

impl HttpCrmClient {
    pub fn new(config: &CrmConfig) -> Result<Self> {
        // No client-level timeout: the retrying client enforces the
        // per-attempt deadline and cancels the in-flight request itself.
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RelayError::ConfigurationError(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint_url: config.endpoint_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CrmTransport for HttpCrmClient {
    async fn send(&self, event: &TrackingEvent) -> std::result::Result<CrmResponse, TransportError> {
        let mut request = self.http.post(&self.endpoint_url).json(event);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(
            event_id = %event.event_id,
            status = status,
            "CRM call completed"
        );

        Ok(CrmResponse { status, body })
    }
}
