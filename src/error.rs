//! Error types for the Turnstile service.

use thiserror::Error;

/// Main error type for Turnstile operations.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Counter store client errors
    #[error("Counter store error: {0}")]
    Store(#[from] redis::RedisError),

    /// The counter store could not be reached within the configured
    /// timeout. The limiter fails closed on this variant.
    #[error("Counter store unavailable: {0}")]
    UpstreamUnavailable(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
