//! # Sharded Rate Limiter
//!
//! Routes admission checks to the shard owning the caller's slice of the key
//! space. Shard resolution is injected so the hosting runtime decides where
//! shard actors live; the default spawns one in-process actor per shard key,
//! on demand.

use super::shard::{spawn_shard, ShardHandle};
use super::{RateLimitDecision, RateLimitPolicy};
use chrono::Utc;
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shard key for identities that cannot be attributed to a network prefix
const GLOBAL_SHARD: &str = "global";

/// Resolves a shard key to the handle of its single-writer actor.
///
/// Implementations must return the same logical actor for the same shard key
/// for the lifetime of the process; serialization per key is what makes
/// check-then-increment safe.
pub trait ShardResolver: Send + Sync {
    fn resolve(&self, shard_key: &str) -> ShardHandle;
}

/// Default in-process resolver: one spawned actor per shard key, created
/// lazily and cached.
#[derive(Debug, Default)]
pub struct SpawnedShards {
    shards: DashMap<String, ShardHandle>,
}

impl SpawnedShards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of shards created so far
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl ShardResolver for SpawnedShards {
    fn resolve(&self, shard_key: &str) -> ShardHandle {
        if let Some(handle) = self.shards.get(shard_key) {
            return handle.value().clone();
        }

        // entry() serializes racing creators for the same key
        self.shards
            .entry(shard_key.to_string())
            .or_insert_with(|| {
                debug!(shard = shard_key, "Creating rate limit shard");
                spawn_shard(shard_key.to_string())
            })
            .value()
            .clone()
    }
}

/// Admission gate for inbound requests, partitioned by client identity.
#[derive(Clone)]
pub struct ShardedRateLimiter {
    resolver: Arc<dyn ShardResolver>,
}

impl std::fmt::Debug for ShardedRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedRateLimiter").finish_non_exhaustive()
    }
}

impl Default for ShardedRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardedRateLimiter {
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(SpawnedShards::new()))
    }

    /// Use a host-supplied shard resolver instead of in-process actors
    pub fn with_resolver(resolver: Arc<dyn ShardResolver>) -> Self {
        Self { resolver }
    }

    /// Derive the shard key from a client identity: first octet for IPv4,
    /// first 16-bit group for IPv6, a shared global shard otherwise. The
    /// same identity always maps to the same shard.
    pub fn shard_key_for(identity: &str) -> String {
        match identity.parse::<IpAddr>() {
            Ok(IpAddr::V4(addr)) => format!("v4-{}", addr.octets()[0]),
            Ok(IpAddr::V6(addr)) => format!("v6-{:x}", addr.segments()[0]),
            Err(_) => GLOBAL_SHARD.to_string(),
        }
    }

    /// Check-and-increment the fixed-window counter for `key` under the
    /// quota `policy`, on the shard derived from `identity`.
    ///
    /// Fails open: when the shard actor is unreachable the request is
    /// admitted and the incident logged, because ingestion availability is
    /// prioritized over strict quota enforcement.
    pub async fn check_and_increment(
        &self,
        identity: &str,
        key: &str,
        policy: RateLimitPolicy,
    ) -> RateLimitDecision {
        let shard_key = Self::shard_key_for(identity);
        let handle = self.resolver.resolve(&shard_key);

        match handle.check_and_increment(key.to_string(), policy).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!(
                    shard = %shard_key,
                    key = %key,
                    error = %err,
                    "Rate limit shard unreachable, failing open"
                );
                Self::fail_open_decision(policy)
            }
        }
    }

    fn fail_open_decision(policy: RateLimitPolicy) -> RateLimitDecision {
        RateLimitDecision {
            allowed: true,
            count: 0,
            limit: policy.limit,
            remaining: policy.limit,
            reset_time: Utc::now().timestamp() + policy.window_seconds as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const POLICY: RateLimitPolicy = RateLimitPolicy {
        limit: 3,
        window_seconds: 60,
    };

    #[test]
    fn test_shard_key_derivation() {
        assert_eq!(ShardedRateLimiter::shard_key_for("10.1.2.3"), "v4-10");
        assert_eq!(ShardedRateLimiter::shard_key_for("10.200.0.1"), "v4-10");
        assert_eq!(ShardedRateLimiter::shard_key_for("192.168.1.1"), "v4-192");
        assert_eq!(
            ShardedRateLimiter::shard_key_for("2001:db8::1"),
            "v6-2001"
        );
        assert_eq!(ShardedRateLimiter::shard_key_for("not-an-ip"), "global");
        assert_eq!(ShardedRateLimiter::shard_key_for(""), "global");
    }

    #[test]
    fn test_shard_key_is_deterministic() {
        for identity in ["10.1.2.3", "2001:db8::42", "opaque-client"] {
            let first = ShardedRateLimiter::shard_key_for(identity);
            for _ in 0..10 {
                assert_eq!(ShardedRateLimiter::shard_key_for(identity), first);
            }
        }
    }

    #[tokio::test]
    async fn test_four_rapid_calls_allow_three_reject_fourth() {
        let limiter = ShardedRateLimiter::new();

        let mut outcomes = Vec::new();
        for _ in 0..4 {
            let decision = limiter
                .check_and_increment("10.1.2.3", "events:10.1.2.3", POLICY)
                .await;
            outcomes.push(decision.allowed);
        }

        assert_eq!(outcomes, vec![true, true, true, false]);

        let last = limiter
            .check_and_increment("10.1.2.3", "events:10.1.2.3", POLICY)
            .await;
        assert_eq!(last.remaining, 0);
    }

    #[tokio::test]
    async fn test_window_reset_admits_again() {
        let limiter = ShardedRateLimiter::new();
        let policy = RateLimitPolicy {
            limit: 2,
            window_seconds: 1,
        };

        for _ in 0..2 {
            assert!(
                limiter
                    .check_and_increment("10.1.2.3", "events:10.1.2.3", policy)
                    .await
                    .allowed
            );
        }
        assert!(
            !limiter
                .check_and_increment("10.1.2.3", "events:10.1.2.3", policy)
                .await
                .allowed
        );

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let decision = limiter
            .check_and_increment("10.1.2.3", "events:10.1.2.3", policy)
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
    }

    #[tokio::test]
    async fn test_same_prefix_shares_shard_different_prefix_does_not() {
        let shards = Arc::new(SpawnedShards::new());
        let limiter = ShardedRateLimiter::with_resolver(shards.clone());

        limiter
            .check_and_increment("10.1.1.1", "events:10.1.1.1", POLICY)
            .await;
        limiter
            .check_and_increment("10.9.9.9", "events:10.9.9.9", POLICY)
            .await;
        assert_eq!(shards.shard_count(), 1);

        limiter
            .check_and_increment("172.16.0.1", "events:172.16.0.1", POLICY)
            .await;
        assert_eq!(shards.shard_count(), 2);
    }

    /// Resolver whose actors are already gone, to exercise fail-open
    struct DeadShards;

    impl ShardResolver for DeadShards {
        fn resolve(&self, _shard_key: &str) -> ShardHandle {
            let (tx, rx) = mpsc::channel(1);
            drop(rx);
            ShardHandle::new(tx)
        }
    }

    #[tokio::test]
    async fn test_unreachable_shard_fails_open() {
        let limiter = ShardedRateLimiter::with_resolver(Arc::new(DeadShards));

        for _ in 0..10 {
            let decision = limiter
                .check_and_increment("10.1.2.3", "events:10.1.2.3", POLICY)
                .await;
            assert!(decision.allowed, "backend failure must not block ingestion");
        }
    }
}
