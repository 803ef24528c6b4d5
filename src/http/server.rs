//! HTTP server implementation.

use std::net::SocketAddr;

use tracing::{error, info};

use super::handlers::{router, AppState};
use crate::error::Result;

/// HTTP server for the lookup service.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared request state
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!(addr = %self.addr, "Starting HTTP server");

        axum::serve(listener, router(self.state)).await.map_err(|e| {
            error!(error = %e, "HTTP server failed");
            e.into()
        })
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!(addr = %self.addr, "Starting HTTP server with graceful shutdown");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                e.into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitingConfig;
    use crate::dataset::Dataset;
    use crate::ratelimit::LimiterRegistry;
    use std::sync::Arc;

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:3000".parse().unwrap();
        let state = AppState {
            registry: Arc::new(LimiterRegistry::new()),
            limiter_settings: RateLimitingConfig::default(),
            identity_header: "x-forwarded-for".to_string(),
            dataset: Arc::new(Dataset::builtin()),
        };
        let _server = HttpServer::new(addr, state);
    }
}
