//! Rate limiting logic and state management.

mod cache;
mod limiter;
mod registry;
pub mod window;

pub use cache::VerdictCache;
pub use limiter::{RateLimiter, Verdict};
pub use registry::LimiterRegistry;
pub use window::WindowConfig;
