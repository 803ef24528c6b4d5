use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber;

use turnstile::config::TurnstileConfig;
use turnstile::dataset::Dataset;
use turnstile::http::{AppState, HttpServer};
use turnstile::ratelimit::LimiterRegistry;

/// Rate-limited HTTP lookup service.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Turnstile Lookup Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = match args.config.as_deref() {
        Some(path) => TurnstileConfig::from_file(path)?,
        None => TurnstileConfig::default(),
    };
    info!(listen_addr = %config.server.listen_addr, "Configuration loaded");

    let dataset = match config.dataset.path.as_deref() {
        Some(path) => Dataset::from_file(path)?,
        None => Dataset::builtin(),
    };
    info!(records = dataset.len(), "Dataset loaded");

    // The limiter itself is constructed lazily by the first request.
    let state = AppState {
        registry: Arc::new(LimiterRegistry::new()),
        limiter_settings: config.rate_limiting.clone(),
        identity_header: config.server.identity_header.clone(),
        dataset: Arc::new(dataset),
    };

    let server = HttpServer::new(config.server.listen_addr, state);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Turnstile Lookup Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
