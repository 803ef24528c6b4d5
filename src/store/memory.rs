//! In-process counter store.
//!
//! Holds the bucket pairs behind a single mutex, which makes the
//! increment-and-check naturally atomic. Counters are not shared across
//! instances; use the Redis store when more than one process serves
//! traffic.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CounterStore, WindowSample};
use crate::error::Result;
use crate::ratelimit::window::{bucket_index, weighted_previous};
use crate::ratelimit::WindowConfig;

/// Bucket pair for one client key.
#[derive(Debug, Clone, Copy)]
struct Buckets {
    index: i64,
    current: u64,
    previous: u64,
}

/// In-memory counter store.
#[derive(Default)]
pub struct MemoryCounterStore {
    slots: Mutex<HashMap<String, Buckets>>,
}

impl MemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with live counters.
    pub fn key_count(&self) -> usize {
        self.slots.lock().len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(
        &self,
        key: &str,
        now_ms: i64,
        config: &WindowConfig,
    ) -> Result<WindowSample> {
        let window_ms = config.window_ms();
        let index = bucket_index(now_ms, window_ms);

        let mut slots = self.slots.lock();
        let buckets = slots.entry(key.to_string()).or_insert(Buckets {
            index,
            current: 0,
            previous: 0,
        });

        // Roll the pair when the bucket boundary was crossed. A gap of
        // two or more buckets means the whole window elapsed idle.
        if index > buckets.index {
            if index - buckets.index >= 2 {
                buckets.previous = 0;
            } else {
                buckets.previous = buckets.current;
            }
            buckets.current = 0;
            buckets.index = index;
        }

        let weighted = weighted_previous(buckets.previous, now_ms, window_ms);
        let allowed = buckets.current + 1 + weighted <= config.max_requests;
        if allowed {
            buckets.current += 1;
        }

        Ok(WindowSample {
            allowed,
            current: buckets.current,
            weighted_previous: weighted,
        })
    }
}
