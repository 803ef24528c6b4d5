//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Dataset configuration
    #[serde(default)]
    pub dataset: DatasetConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Header carrying the client's source address, set by the
    /// front-line network layer. Requests without it share the
    /// "anonymous" quota.
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            identity_header: default_identity_header(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    ([127, 0, 0, 1], 3000).into()
}

fn default_identity_header() -> String {
    "x-forwarded-for".to_string()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Maximum requests allowed per client within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Window duration in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Address of the shared counter store (e.g. "redis://127.0.0.1:6379").
    /// When unset, counters are kept in process memory and are not shared
    /// across instances.
    pub store_addr: Option<String>,

    /// Access token for the counter store
    pub store_token: Option<String>,

    /// Timeout for one counter store round-trip in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            store_addr: None,
            store_token: None,
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

/// Largest window that still fits the limiter's millisecond arithmetic.
const MAX_WINDOW_SECS: u64 = i64::MAX as u64 / 1000;

impl RateLimitingConfig {
    /// Check the window policy invariants: both the request cap and the
    /// window duration must be positive, and the window must fit in
    /// millisecond arithmetic.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_requests == 0 {
            return Err(crate::error::TurnstileError::Config(
                "max_requests must be greater than zero".to_string(),
            ));
        }
        if self.window_secs == 0 {
            return Err(crate::error::TurnstileError::Config(
                "window_secs must be greater than zero".to_string(),
            ));
        }
        if self.window_secs > MAX_WINDOW_SECS {
            return Err(crate::error::TurnstileError::Config(format!(
                "window_secs must not exceed {}",
                MAX_WINDOW_SECS
            )));
        }
        Ok(())
    }

    /// The window duration as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// The store timeout as a [`Duration`].
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn default_max_requests() -> u64 {
    4
}

fn default_window_secs() -> u64 {
    10
}

fn default_store_timeout_ms() -> u64 {
    1000
}

/// Dataset configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to a JSON array of records. When unset, a small built-in
    /// dataset is served.
    pub path: Option<String>,
}

impl TurnstileConfig {
    /// Load configuration from a file path, rejecting invalid window
    /// policies at load time rather than per request.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: TurnstileConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::TurnstileError::Config(e.to_string()))?;
        config.rate_limiting.validate()?;
        Ok(config)
    }
}
