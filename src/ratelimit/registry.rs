//! Lazy, process-wide limiter construction.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, trace};

use super::limiter::RateLimiter;
use super::window::WindowConfig;
use crate::config::RateLimitingConfig;
use crate::error::Result;
use crate::store::{CounterStore, MemoryCounterStore, RedisCounterStore};

/// Hands out the single shared [`RateLimiter`] for this process.
///
/// The limiter is built lazily by whichever request arrives first, using
/// that request's settings; every later call returns the same instance
/// and its settings are ignored. There is no reset or reconfiguration for
/// the process lifetime, and the one-time initialization is guarded
/// against concurrent first requests.
#[derive(Default)]
pub struct LimiterRegistry {
    limiter: OnceCell<Arc<RateLimiter>>,
}

impl LimiterRegistry {
    /// Create an uninitialized registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry already holding the given limiter. Useful for
    /// tests and embedders that construct the limiter themselves.
    pub fn with_limiter(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter: OnceCell::new_with(Some(limiter)),
        }
    }

    /// Return the shared limiter, constructing it from `settings` on the
    /// first call. First writer wins: settings supplied by later calls
    /// are silently ignored, a known sharp edge kept by design.
    pub async fn get_or_init(&self, settings: &RateLimitingConfig) -> Result<Arc<RateLimiter>> {
        if let Some(existing) = self.limiter.get() {
            trace!("Rate limiter already initialized, settings ignored");
            return Ok(existing.clone());
        }

        let limiter = self
            .limiter
            .get_or_try_init(|| async {
                settings.validate()?;
                let store = build_store(settings).await?;
                let config = WindowConfig::new(settings.max_requests, settings.window());
                info!(
                    max_requests = config.max_requests,
                    window_secs = settings.window_secs,
                    shared_store = settings.store_addr.is_some(),
                    "Rate limiter initialized"
                );
                Ok::<_, crate::error::TurnstileError>(Arc::new(RateLimiter::new(
                    config,
                    store,
                    settings.store_timeout(),
                )))
            })
            .await?;

        Ok(limiter.clone())
    }
}

async fn build_store(settings: &RateLimitingConfig) -> Result<Arc<dyn CounterStore>> {
    match settings.store_addr.as_deref() {
        Some(addr) => {
            let store = RedisCounterStore::connect(addr, settings.store_token.as_deref()).await?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryCounterStore::new())),
    }
}
