//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use super::cache::VerdictCache;
use super::window::{bucket_reset_ms, WindowConfig};
use crate::error::{Result, TurnstileError};
use crate::store::CounterStore;

/// Outcome of one rate limit check. Produced fresh per call, never
/// persisted.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Whether the request is admitted
    pub allowed: bool,
    /// The configured limit for the window
    pub limit: u64,
    /// Requests left in the current trailing window
    pub remaining: u64,
    /// When the current bucket ends and quota begins to recover
    pub reset_at: DateTime<Utc>,
}

/// The rate limiter gating every request.
///
/// Composes the sliding-window arithmetic, the shared counter store and
/// the process-local verdict cache behind a single [`limit`] operation.
/// Thread-safe; share it via `Arc`.
///
/// [`limit`]: RateLimiter::limit
pub struct RateLimiter {
    config: WindowConfig,
    store: Arc<dyn CounterStore>,
    cache: VerdictCache,
    store_timeout: Duration,
}

impl RateLimiter {
    /// Create a limiter over the given store.
    pub fn new(config: WindowConfig, store: Arc<dyn CounterStore>, store_timeout: Duration) -> Self {
        Self {
            config,
            store,
            cache: VerdictCache::new(),
            store_timeout,
        }
    }

    /// The window policy this limiter enforces.
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Check the rate limit for a client key at the current instant.
    ///
    /// Fails closed: when the counter store cannot be reached within the
    /// configured timeout this returns
    /// [`TurnstileError::UpstreamUnavailable`] instead of guessing a
    /// verdict. A single store attempt is made per call.
    pub async fn limit(&self, key: &str) -> Result<Verdict> {
        self.limit_at(key, Utc::now().timestamp_millis()).await
    }

    /// Check the rate limit for a client key at an explicit instant
    /// (epoch milliseconds). Deterministic given the key, the instant and
    /// the arrival order.
    pub async fn limit_at(&self, key: &str, now_ms: i64) -> Result<Verdict> {
        let window_ms = self.config.window_ms();

        // A key known to be over limit within the current bucket is
        // denied without a remote round-trip. Allows never short-circuit
        // here; they always require the store's committed increment.
        if let Some(reset_ms) = self.cache.blocked_until(key, now_ms) {
            trace!(key = %key, "Deny served from local verdict cache");
            return Ok(self.denied_verdict(reset_ms));
        }

        let sample = match tokio::time::timeout(
            self.store_timeout,
            self.store.increment(key, now_ms, &self.config),
        )
        .await
        {
            Ok(Ok(sample)) => sample,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Counter store request failed");
                return Err(TurnstileError::UpstreamUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!(key = %key, timeout = ?self.store_timeout, "Counter store request timed out");
                return Err(TurnstileError::UpstreamUnavailable(format!(
                    "no response within {:?}",
                    self.store_timeout
                )));
            }
        };

        let reset_ms = bucket_reset_ms(now_ms, window_ms);
        if sample.allowed {
            self.cache.forget(key);
            Ok(Verdict {
                allowed: true,
                limit: self.config.max_requests,
                remaining: self.config.max_requests.saturating_sub(sample.estimate()),
                reset_at: datetime_from_ms(reset_ms),
            })
        } else {
            debug!(
                key = %key,
                estimate = sample.estimate() + 1,
                limit = self.config.max_requests,
                "Rate limit exceeded"
            );
            self.cache.block(key, reset_ms);
            Ok(self.denied_verdict(reset_ms))
        }
    }

    fn denied_verdict(&self, reset_ms: i64) -> Verdict {
        Verdict {
            allowed: false,
            limit: self.config.max_requests,
            remaining: 0,
            reset_at: datetime_from_ms(reset_ms),
        }
    }
}

fn datetime_from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}
