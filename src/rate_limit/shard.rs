//! # Shard Actor
//!
//! One shard owns the counters for its partition of rate-limit keys and
//! processes commands sequentially off an mpsc channel. Check-then-increment
//! is therefore one serialized step per (shard, key): two concurrent callers
//! can never both claim the last slot in a window.

use super::{RateLimitDecision, RateLimitPolicy};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Commands are small enough that a modest buffer keeps senders from
/// suspending under normal load.
const SHARD_COMMAND_BUFFER: usize = 256;

/// Fixed-window counter for one rate-limit key. Created lazily on first
/// check, reset in place when the window elapses, never deleted.
#[derive(Debug)]
struct RateLimitCounter {
    count: u32,
    /// Unix seconds at the start of the current window
    window_start: i64,
}

#[derive(Debug)]
pub(crate) enum ShardCommand {
    CheckAndIncrement {
        key: String,
        policy: RateLimitPolicy,
        reply: oneshot::Sender<RateLimitDecision>,
    },
}

/// Cheap, cloneable address of a shard actor
#[derive(Debug, Clone)]
pub struct ShardHandle {
    tx: mpsc::Sender<ShardCommand>,
}

impl ShardHandle {
    pub(crate) fn new(tx: mpsc::Sender<ShardCommand>) -> Self {
        Self { tx }
    }

    /// Run the check on the owning shard. `Err` means the shard actor is
    /// unreachable; the caller decides the fail-open policy.
    pub async fn check_and_increment(
        &self,
        key: String,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitDecision, ShardUnreachable> {
        let (reply, rx) = oneshot::channel();

        self.tx
            .send(ShardCommand::CheckAndIncrement { key, policy, reply })
            .await
            .map_err(|_| ShardUnreachable)?;

        rx.await.map_err(|_| ShardUnreachable)
    }
}

/// The shard actor is gone or dropped the reply
#[derive(Debug, thiserror::Error)]
#[error("rate limit shard actor unreachable")]
pub struct ShardUnreachable;

/// Spawn the actor task for one shard key and return its handle.
///
/// Public so host-supplied [`ShardResolver`](super::ShardResolver)
/// implementations can decide shard placement while reusing the actor.
pub fn spawn_shard(shard_key: String) -> ShardHandle {
    let (tx, mut rx) = mpsc::channel(SHARD_COMMAND_BUFFER);

    tokio::spawn(async move {
        let mut counters: HashMap<String, RateLimitCounter> = HashMap::new();

        debug!(shard = %shard_key, "Rate limit shard started");

        while let Some(command) = rx.recv().await {
            match command {
                ShardCommand::CheckAndIncrement { key, policy, reply } => {
                    let decision = check_and_increment(&mut counters, &key, policy);
                    // Caller may have given up waiting; nothing to do then.
                    let _ = reply.send(decision);
                }
            }
        }

        debug!(shard = %shard_key, "Rate limit shard stopped");
    });

    ShardHandle::new(tx)
}

/// Core fixed-window check. Rejections never increment the counter.
fn check_and_increment(
    counters: &mut HashMap<String, RateLimitCounter>,
    key: &str,
    policy: RateLimitPolicy,
) -> RateLimitDecision {
    let now = Utc::now().timestamp();

    let counter = counters
        .entry(key.to_string())
        .or_insert(RateLimitCounter {
            count: 0,
            window_start: now,
        });

    if now >= counter.window_start + policy.window_seconds as i64 {
        counter.count = 0;
        counter.window_start = now;
    }

    let reset_time = counter.window_start + policy.window_seconds as i64;

    if counter.count >= policy.limit {
        return RateLimitDecision {
            allowed: false,
            count: counter.count,
            limit: policy.limit,
            remaining: 0,
            reset_time,
        };
    }

    counter.count += 1;

    RateLimitDecision {
        allowed: true,
        count: counter.count,
        limit: policy.limit,
        remaining: policy.limit - counter.count,
        reset_time,
    }
}
