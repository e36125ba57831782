//! # CRM Relay
//!
//! Wires the circuit breaker around the retrying client around the raw
//! transport and flattens the nested results into one [`DeliveryOutcome`].
//!
//! What the breaker counts: timeouts, transport errors, and a retry budget
//! ending on 5xx are failures; 2xx and 4xx are successes, because a 4xx means
//! the dependency answered and is healthy even though this event was refused.

use super::transport::{CrmResponse, CrmTransport, TransportError};
use super::{DeliveryFailure, DeliveryOutcome, TrackingEvent};
use crate::resilience::{
    CallError, CallOutcome, CircuitBreaker, CircuitBreakerError, RetryPolicy, RetryingClient,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Failure of one protected delivery, as seen by the circuit breaker
enum AttemptFailure {
    /// Retry budget ended in a timeout or transport error
    Call(CallError<TransportError>),
    /// Retry budget ended holding a 5xx response
    Server(CallOutcome<CrmResponse>),
}

impl From<CallError<TransportError>> for AttemptFailure {
    fn from(err: CallError<TransportError>) -> Self {
        AttemptFailure::Call(err)
    }
}

/// Outbound delivery orchestrator for one CRM dependency.
///
/// Constructed once at startup; the breaker instance is owned here and
/// shared by `Arc`, never a process-wide global.
pub struct CrmRelay {
    transport: Arc<dyn CrmTransport>,
    breaker: Arc<CircuitBreaker>,
    retrying: RetryingClient<CrmResponse, TransportError>,
}

impl std::fmt::Debug for CrmRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmRelay")
            .field("breaker", &self.breaker)
            .field("retrying", &self.retrying)
            .finish_non_exhaustive()
    }
}

impl CrmRelay {
    pub fn new(
        transport: Arc<dyn CrmTransport>,
        breaker: Arc<CircuitBreaker>,
        retry_policy: RetryPolicy,
    ) -> Self {
        let retrying = RetryingClient::new(retry_policy)
            .with_retry_response(|response: &CrmResponse| response.is_server_error());

        Self {
            transport,
            breaker,
            retrying,
        }
    }

    /// Breaker guarding this relay, for health reporting
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Deliver one event to the CRM and classify the result.
    ///
    /// Never returns an error: every path, including breaker rejection,
    /// collapses into a [`DeliveryOutcome`] for the sync-status tracker.
    pub async fn deliver(&self, event: &TrackingEvent) -> DeliveryOutcome {
        let result = self
            .breaker
            .call(|| async {
                let outcome = self.retrying.call(|| self.transport.send(event)).await?;

                if outcome.response.is_server_error() {
                    // Keep the response but let the breaker count the failure
                    return Err(AttemptFailure::Server(outcome));
                }

                Ok(outcome)
            })
            .await;

        let breaker_state = self.breaker.state();

        let outcome = match result {
            Ok(call) => {
                let status = call.response.status;
                if call.response.is_success() {
                    DeliveryOutcome {
                        success: true,
                        status: Some(status),
                        failure: None,
                        attempts: call.attempts,
                        breaker_state,
                    }
                } else {
                    DeliveryOutcome {
                        success: false,
                        status: Some(status),
                        failure: Some(DeliveryFailure::ClientError),
                        attempts: call.attempts,
                        breaker_state,
                    }
                }
            }
            Err(CircuitBreakerError::CircuitOpen { .. }) => DeliveryOutcome {
                success: false,
                status: None,
                failure: Some(DeliveryFailure::BreakerOpen),
                attempts: 0,
                breaker_state,
            },
            Err(CircuitBreakerError::OperationFailed(AttemptFailure::Server(call))) => {
                DeliveryOutcome {
                    success: false,
                    status: Some(call.response.status),
                    failure: Some(DeliveryFailure::ServerError),
                    attempts: call.attempts,
                    breaker_state,
                }
            }
            Err(CircuitBreakerError::OperationFailed(AttemptFailure::Call(err))) => {
                let failure = match &err {
                    CallError::Timeout { .. } => DeliveryFailure::Timeout,
                    CallError::Transport { .. } => DeliveryFailure::TransportError,
                };
                DeliveryOutcome {
                    success: false,
                    status: None,
                    failure: Some(failure),
                    attempts: err.attempts(),
                    breaker_state,
                }
            }
        };

        if outcome.success {
            debug!(
                event_id = %event.event_id,
                attempts = outcome.attempts,
                "Event delivered to CRM"
            );
        } else {
            warn!(
                event_id = %event.event_id,
                failure = ?outcome.failure,
                status = outcome.status,
                attempts = outcome.attempts,
                breaker_state = ?outcome.breaker_state,
                "Event delivery failed"
            );
        }

        outcome
    }
}
