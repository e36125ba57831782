//! # Configuration Management
//!
//! Layered configuration for the relay: compiled defaults, an optional TOML
//! file, and `BEACON_`-prefixed environment overrides (e.g.
//! `BEACON_SERVER__PORT=8080`). Serde structs here stay wire-friendly
//! (millisecond/second integers); conversion helpers produce the richer
//! `Duration`-based component configs.

use crate::error::{RelayError, Result};
use crate::rate_limit::RateLimitPolicy;
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub crm: CrmConfig,
    pub circuit_breaker: CircuitBreakerSettings,
    pub rate_limits: RateLimitSettings,
}

/// HTTP server binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

/// Outbound CRM dependency and its retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Endpoint the relay posts qualifying events to
    pub endpoint_url: String,

    /// Optional bearer token for the CRM API
    pub api_key: Option<String>,

    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Additional attempts after the first (total = max_retries + 1)
    pub max_retries: u32,

    /// Base backoff delay, doubled per attempt
    pub initial_delay_ms: u64,
}

/// Circuit breaker tuning for the CRM dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub success_threshold: u32,
}

/// Admission quotas per endpoint class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,

    /// Tight per-minute quota for the ingestion endpoint
    pub events: RateLimitPolicy,

    /// Looser per-hour quota for management endpoints
    pub management: RateLimitPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
            },
            crm: CrmConfig {
                endpoint_url: "http://localhost:9090/api/people".to_string(),
                api_key: None,
                timeout_ms: 5_000,
                max_retries: 2,
                initial_delay_ms: 200,
            },
            circuit_breaker: CircuitBreakerSettings {
                failure_threshold: 5,
                reset_timeout_ms: 30_000,
                success_threshold: 2,
            },
            rate_limits: RateLimitSettings {
                enabled: true,
                events: RateLimitPolicy {
                    limit: 120,
                    window_seconds: 60,
                },
                management: RateLimitPolicy {
                    limit: 1_000,
                    window_seconds: 3_600,
                },
            },
        }
    }
}

impl RelayConfig {
    /// Load configuration from defaults, an optional file, and environment
    /// overrides. `path` pins a specific config file; otherwise
    /// `config/beacon-relay.toml` is picked up when present.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = config::Config::try_from(&RelayConfig::default())?;

        let mut builder = config::Config::builder().add_source(defaults);

        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder.add_source(config::File::with_name("config/beacon-relay").required(false)),
        };

        let settings = builder
            .add_source(config::Environment::with_prefix("BEACON").separator("__"))
            .build()?;

        let relay_config: RelayConfig = settings.try_deserialize()?;
        relay_config
            .validate()
            .map_err(RelayError::ConfigurationError)?;

        Ok(relay_config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.crm.endpoint_url.is_empty() {
            return Err("crm.endpoint_url must not be empty".to_string());
        }

        if self.crm.timeout_ms == 0 {
            return Err("crm.timeout_ms must be greater than 0".to_string());
        }

        if self.crm.initial_delay_ms == 0 {
            return Err("crm.initial_delay_ms must be greater than 0".to_string());
        }

        self.circuit_breaker_config().validate()?;
        self.rate_limits.events.validate()?;
        self.rate_limits.management.validate()?;

        Ok(())
    }

    /// Circuit breaker config for the CRM dependency
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker.failure_threshold,
            reset_timeout: Duration::from_millis(self.circuit_breaker.reset_timeout_ms),
            success_threshold: self.circuit_breaker.success_threshold,
        }
    }

    /// Retry policy for outbound CRM calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.crm.timeout_ms),
            max_retries: self.crm.max_retries,
            initial_delay: Duration::from_millis(self.crm.initial_delay_ms),
        }
    }
}
