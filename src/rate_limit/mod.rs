//! # Sharded Rate Limiting
//!
//! Fixed-window admission control, partitioned into independent shards so
//! inbound traffic never funnels through one contention point. Each shard is
//! a single-writer actor owning the counters for its slice of keys; the same
//! client identity always resolves to the same shard.
//!
//! Fixed-window counting is deliberate: a client can burst up to twice the
//! nominal limit across a window boundary. That is accepted behavior, not a
//! defect, and must not be silently upgraded to a sliding window.

pub mod limiter;
pub mod shard;

pub use limiter::{ShardResolver, ShardedRateLimiter, SpawnedShards};
pub use shard::{spawn_shard, ShardHandle, ShardUnreachable};

use serde::{Deserialize, Serialize};

/// Quota for one endpoint class: `limit` requests per `window_seconds`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window_seconds: u64,
}

impl RateLimitPolicy {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.limit == 0 {
            return Err("rate limit must be greater than 0".to_string());
        }

        if self.window_seconds == 0 {
            return Err("rate limit window must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests counted in the current window (unchanged on rejection)
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds when the current window resets
    pub reset_time: i64,
}

impl RateLimitDecision {
    /// Seconds until the window resets, floored at zero
    pub fn retry_after_seconds(&self) -> i64 {
        (self.reset_time - chrono::Utc::now().timestamp()).max(0)
    }
}
