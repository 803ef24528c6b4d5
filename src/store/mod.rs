//! Counter store backends.
//!
//! A counter store holds the authoritative per-key bucket counters and
//! provides the single atomic increment-and-check primitive the limiter
//! builds on. All mutation goes through that primitive; a separate
//! read-then-write sequence would let concurrent requests jointly exceed
//! the limit.

mod memory;
mod redis_store;

pub use memory::MemoryCounterStore;
pub use redis_store::RedisCounterStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::ratelimit::WindowConfig;

/// Outcome of one atomic increment-and-check against a store.
#[derive(Debug, Clone, Copy)]
pub struct WindowSample {
    /// Whether the request was admitted (and its increment committed)
    pub allowed: bool,
    /// Count in the current bucket, including this request when committed
    pub current: u64,
    /// Weighted share of the previous bucket inside the trailing window
    pub weighted_previous: u64,
}

impl WindowSample {
    /// Estimated requests in the trailing window as committed to the
    /// store. On an allowed check this includes the request just
    /// admitted; on a denied check the request was not committed and is
    /// not counted here, so the tentative estimate that tripped the
    /// limit is `estimate() + 1`.
    pub fn estimate(&self) -> u64 {
        self.current + self.weighted_previous
    }
}

/// Trait for counter store backends.
///
/// Implementations must make the whole roll-estimate-commit sequence
/// atomic per key, across all concurrent callers sharing the store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically evaluate one request for `key` at instant `now_ms`
    /// (epoch milliseconds): roll the bucket pair if the bucket boundary
    /// was crossed, compute the trailing-window estimate with this request
    /// tentatively included, and commit the increment only when the
    /// estimate stays within `config.max_requests`.
    async fn increment(&self, key: &str, now_ms: i64, config: &WindowConfig)
        -> Result<WindowSample>;
}
