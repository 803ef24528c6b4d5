//! Redis-backed counter store.
//!
//! Buckets live under per-index keys (`ratelimit:{key}:{bucket}`), so
//! rolling the pair is implicit: a new bucket index reads as zero and
//! stale buckets expire through their TTL. The estimate-and-commit
//! sequence runs as one Lua script, which Redis executes atomically, so
//! concurrent requests across all service instances observe a total order
//! of commits per key.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use super::{CounterStore, WindowSample};
use crate::error::Result;
use crate::ratelimit::window::bucket_index;
use crate::ratelimit::WindowConfig;

/// Atomic increment-and-check.
///
/// KEYS[1] = current bucket, KEYS[2] = previous bucket.
/// ARGV = max_requests, now_ms, window_ms.
/// Returns {admitted, current_count, weighted_previous}.
const INCREMENT_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local previous = tonumber(redis.call('GET', KEYS[2]) or '0')
local max_requests = tonumber(ARGV[1])
local now_ms = tonumber(ARGV[2])
local window_ms = tonumber(ARGV[3])

local elapsed = (now_ms % window_ms) / window_ms
local weighted = math.floor(previous * (1 - elapsed))

if current + 1 + weighted > max_requests then
  return {0, current, weighted}
end

current = redis.call('INCR', KEYS[1])
if current == 1 then
  redis.call('PEXPIRE', KEYS[1], window_ms * 2)
end
return {1, current, weighted}
"#;

/// Counter store backed by a shared Redis instance.
pub struct RedisCounterStore {
    manager: ConnectionManager,
    script: Script,
}

impl RedisCounterStore {
    /// Connect to the store at the given address. The multiplexed
    /// connection is established once here and shared by every check;
    /// the manager reconnects on its own after a drop.
    pub async fn connect(addr: &str, token: Option<&str>) -> Result<Self> {
        let url = build_url(addr, token);
        let client = Client::open(url.as_str())?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager,
            script: Script::new(INCREMENT_SCRIPT),
        })
    }

    fn bucket_key(key: &str, index: i64) -> String {
        format!("ratelimit:{}:{}", key, index)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(
        &self,
        key: &str,
        now_ms: i64,
        config: &WindowConfig,
    ) -> Result<WindowSample> {
        let mut conn = self.manager.clone();

        let window_ms = config.window_ms();
        let index = bucket_index(now_ms, window_ms);

        let (admitted, current, weighted_previous): (i64, u64, u64) = self
            .script
            .key(Self::bucket_key(key, index))
            .key(Self::bucket_key(key, index - 1))
            .arg(config.max_requests)
            .arg(now_ms)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await?;

        Ok(WindowSample {
            allowed: admitted == 1,
            current,
            weighted_previous,
        })
    }
}

/// Build a Redis connection URL, injecting the access token as the
/// password when one is configured and the address carries none.
fn build_url(addr: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if !addr.contains('@') => match addr.split_once("://") {
            Some((scheme, rest)) => format!("{}://:{}@{}", scheme, token, rest),
            None => format!("redis://:{}@{}", token, addr),
        },
        _ => addr.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_without_token() {
        assert_eq!(
            build_url("redis://127.0.0.1:6379", None),
            "redis://127.0.0.1:6379"
        );
    }

    #[test]
    fn test_build_url_injects_token() {
        assert_eq!(
            build_url("redis://example.com:6379", Some("secret")),
            "redis://:secret@example.com:6379"
        );
    }

    #[test]
    fn test_build_url_bare_host() {
        assert_eq!(
            build_url("example.com:6379", Some("secret")),
            "redis://:secret@example.com:6379"
        );
    }

    #[test]
    fn test_build_url_keeps_existing_credentials() {
        assert_eq!(
            build_url("redis://user:pw@example.com", Some("secret")),
            "redis://user:pw@example.com"
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_address() {
        assert!(RedisCounterStore::connect("not a url", None).await.is_err());
    }

    #[test]
    fn test_bucket_key_format() {
        assert_eq!(
            RedisCounterStore::bucket_key("1.2.3.4", 42),
            "ratelimit:1.2.3.4:42"
        );
    }
}
