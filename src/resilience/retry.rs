//! # Retrying Call Wrapper
//!
//! Makes one logical network call resilient to transient failure: every
//! attempt runs under its own timeout, retryable failures back off
//! exponentially, and non-retryable results return immediately. A real
//! response received on the final attempt is returned as-is rather than
//! discarded, even when it is a retryable failure.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Retry tuning for a logical call. `max_retries` counts the attempts after
/// the first, so the total attempt budget is `max_retries + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Per-attempt deadline; the in-flight future is dropped when it fires
    pub timeout: Duration,

    /// Additional attempts after the first
    pub max_retries: u32,

    /// Base backoff delay, doubled per attempt (d, 2d, 4d, ...)
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }

        if self.initial_delay.is_zero() {
            return Err("initial_delay must be greater than 0".to_string());
        }

        if self.max_retries > 10 {
            return Err("max_retries should not exceed 10".to_string());
        }

        Ok(())
    }

    /// Backoff delay before the attempt following `attempt` (0-indexed)
    fn backoff_delay(&self, attempt: u32) -> Duration {
        // Cap the shift so pathological configs saturate instead of overflow
        let factor = 1u32 << attempt.min(16);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Failure of a retried call, after the retry budget was applied.
///
/// Timeouts are normalized into their own variant so callers can distinguish
/// a slow dependency from a broken transport.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    #[error("Attempt timed out after {timeout:?} ({attempts} attempts made)")]
    Timeout { timeout: Duration, attempts: u32 },

    #[error("Transport error after {attempts} attempts: {source}")]
    Transport { source: E, attempts: u32 },
}

impl<E> CallError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            CallError::Timeout { attempts, .. } => *attempts,
            CallError::Transport { attempts, .. } => *attempts,
        }
    }
}

/// Successful call result plus how many attempts it took
#[derive(Debug)]
pub struct CallOutcome<R> {
    pub response: R,
    pub attempts: u32,
}

/// Timeout/backoff retry wrapper around one asynchronous operation.
///
/// `retry_response` marks a received response as a retryable failure (e.g.
/// HTTP 5xx); anything else returns immediately, which covers both successes
/// and non-retryable failures such as 4xx. `retry_error` decides whether a
/// timeout or transport error is worth another attempt; the default retries
/// all of them.
pub struct RetryingClient<R, E> {
    policy: RetryPolicy,
    retry_response: Arc<dyn Fn(&R) -> bool + Send + Sync>,
    retry_error: Arc<dyn Fn(&CallError<E>) -> bool + Send + Sync>,
}

impl<R, E> Clone for RetryingClient<R, E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            retry_response: Arc::clone(&self.retry_response),
            retry_error: Arc::clone(&self.retry_error),
        }
    }
}

impl<R, E> std::fmt::Debug for RetryingClient<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<R, E> RetryingClient<R, E> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retry_response: Arc::new(|_| false),
            retry_error: Arc::new(|_| true),
        }
    }

    /// Predicate marking a received response as a retryable failure
    pub fn with_retry_response<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.retry_response = Arc::new(predicate);
        self
    }

    /// Predicate deciding whether a timeout/transport error is retried
    pub fn with_retry_error<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CallError<E>) -> bool + Send + Sync + 'static,
    {
        self.retry_error = Arc::new(predicate);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation` with per-attempt timeouts and exponential backoff.
    ///
    /// A timed-out attempt's future is dropped the moment the deadline fires;
    /// its result can never leak into a later attempt.
    pub async fn call<F, Fut>(&self, mut operation: F) -> Result<CallOutcome<R>, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let total_attempts = self.policy.max_retries + 1;

        for attempt in 0..total_attempts {
            let attempts_made = attempt + 1;
            let is_final = attempts_made == total_attempts;

            match tokio::time::timeout(self.policy.timeout, operation()).await {
                Ok(Ok(response)) => {
                    if !(self.retry_response)(&response) {
                        return Ok(CallOutcome {
                            response,
                            attempts: attempts_made,
                        });
                    }

                    if is_final {
                        // Retry budget spent but we hold a real response;
                        // return it rather than synthesizing an error.
                        warn!(
                            attempts = attempts_made,
                            "Retry budget exhausted, returning last retryable response"
                        );
                        return Ok(CallOutcome {
                            response,
                            attempts: attempts_made,
                        });
                    }

                    warn!(attempt = attempts_made, "Retryable response, backing off");
                }
                Ok(Err(source)) => {
                    let err = CallError::Transport {
                        source,
                        attempts: attempts_made,
                    };
                    if is_final || !(self.retry_error)(&err) {
                        return Err(err);
                    }
                    warn!(attempt = attempts_made, "Transport error, backing off");
                }
                Err(_elapsed) => {
                    let err = CallError::Timeout {
                        timeout: self.policy.timeout,
                        attempts: attempts_made,
                    };
                    if is_final || !(self.retry_error)(&err) {
                        return Err(err);
                    }
                    warn!(
                        attempt = attempts_made,
                        timeout_ms = self.policy.timeout.as_millis() as u64,
                        "Attempt timed out, backing off"
                    );
                }
            }

            tokio::time::sleep(self.policy.backoff_delay(attempt)).await;
        }

        unreachable!("retry loop returns on the final attempt")
    }
}
