//! HTTP surface of the lookup service.

mod handlers;
mod server;

pub use handlers::{router, AppState};
pub use server::HttpServer;
