//! Process-local verdict cache.
//!
//! Remembers keys recently denied by the store so that follow-up requests
//! from a client already over limit skip the remote round-trip until the
//! bucket resets. The cache is advisory: it may serve a slightly stale
//! deny, and an allow always requires the store's committed increment.

use dashmap::DashMap;

/// Best-effort cache of denied keys and their reset instants.
///
/// The map is flat and unbounded per key; entries are overwritten in
/// place on a later deny and removed once a check passes again.
#[derive(Default)]
pub struct VerdictCache {
    denied: DashMap<String, i64>,
}

impl VerdictCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// If `key` was denied and its bucket has not reset by `now_ms`,
    /// return the cached reset instant.
    pub fn blocked_until(&self, key: &str, now_ms: i64) -> Option<i64> {
        self.denied
            .get(key)
            .map(|entry| *entry.value())
            .filter(|reset_ms| *reset_ms > now_ms)
    }

    /// Record that `key` is over limit until `reset_ms`.
    pub fn block(&self, key: &str, reset_ms: i64) {
        self.denied.insert(key.to_string(), reset_ms);
    }

    /// Drop the entry for `key`, typically after an allowed check.
    pub fn forget(&self, key: &str) {
        self.denied.remove(key);
    }

    /// Number of cached deny entries.
    pub fn len(&self) -> usize {
        self.denied.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.denied.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_is_not_blocked() {
        let cache = VerdictCache::new();
        assert_eq!(cache.blocked_until("1.2.3.4", 1_000), None);
    }

    #[test]
    fn test_block_holds_until_reset() {
        let cache = VerdictCache::new();
        cache.block("1.2.3.4", 10_000);

        assert_eq!(cache.blocked_until("1.2.3.4", 9_999), Some(10_000));
        assert_eq!(cache.blocked_until("1.2.3.4", 10_000), None);
    }

    #[test]
    fn test_forget_clears_entry() {
        let cache = VerdictCache::new();
        cache.block("1.2.3.4", 10_000);
        cache.forget("1.2.3.4");

        assert_eq!(cache.blocked_until("1.2.3.4", 1_000), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_later_deny_overwrites() {
        let cache = VerdictCache::new();
        cache.block("1.2.3.4", 10_000);
        cache.block("1.2.3.4", 20_000);

        assert_eq!(cache.blocked_until("1.2.3.4", 15_000), Some(20_000));
        assert_eq!(cache.len(), 1);
    }
}
