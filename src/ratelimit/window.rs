//! Sliding-window counter arithmetic.
//!
//! Time is divided into fixed buckets of one window length. The request
//! count for the trailing window is estimated from the current and the
//! previous bucket:
//!
//! ```text
//! estimate = current + previous * (1 - elapsed_fraction_of_current_bucket)
//! ```
//!
//! The estimate is exact at bucket boundaries and may under-count bursty
//! traffic near a bucket transition by at most one request. Memory cost is
//! two counters per key.

use std::time::Duration;

/// Immutable window policy, fixed at limiter construction.
///
/// Both fields must be positive; configuration-driven construction goes
/// through `RateLimitingConfig::validate`, which rejects zero and
/// millisecond-overflowing windows before a limiter is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Maximum requests allowed within one trailing window
    pub max_requests: u64,
    /// Window duration
    pub window: Duration,
}

impl WindowConfig {
    /// Create a new window policy.
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// The window duration in milliseconds.
    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

/// Index of the bucket containing `now_ms`.
pub fn bucket_index(now_ms: i64, window_ms: i64) -> i64 {
    now_ms.div_euclid(window_ms)
}

/// Fraction of the current bucket that has elapsed, in `[0, 1)`.
pub fn elapsed_fraction(now_ms: i64, window_ms: i64) -> f64 {
    now_ms.rem_euclid(window_ms) as f64 / window_ms as f64
}

/// Weighted share of the previous bucket still inside the trailing
/// window, rounded down.
pub fn weighted_previous(previous: u64, now_ms: i64, window_ms: i64) -> u64 {
    let weight = 1.0 - elapsed_fraction(now_ms, window_ms);
    (previous as f64 * weight).floor() as u64
}

/// Instant (epoch milliseconds) at which the current bucket ends.
pub fn bucket_reset_ms(now_ms: i64, window_ms: i64) -> i64 {
    (bucket_index(now_ms, window_ms) + 1) * window_ms
}
