//! Credits API Server Binary
//!
//! This binary starts the HTTP API server for the prepaid credits system.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin credits-api
//!
//! # Run with environment variables
//! PAYMENTS_PORT=8080 PAYMENTS_STRIPE__SECRET_KEY=sk_... cargo run --bin credits-api
//! ```
//!
//! # Environment Variables
//!
//! * `PAYMENTS_HOST` - Server host (default: 0.0.0.0)
//! * `PAYMENTS_PORT` - Server port (default: 8080)
//! * `PAYMENTS_ENVIRONMENT` - production, staging, development, or test
//! * `PAYMENTS_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `PAYMENTS_STRIPE__SECRET_KEY` / `PAYMENTS_STRIPE__WEBHOOK_SECRET` - Stripe credentials
//! * `PAYMENTS_PAYPAL__CLIENT_ID` / `PAYMENTS_PAYPAL__CLIENT_SECRET` /
//!   `PAYMENTS_PAYPAL__WEBHOOK_ID` - PayPal credentials

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use infra_memory::MemoryBackend;
use interface_api::{config::ApiConfig, create_router, wiring};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().unwrap_or_default();

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        environment = %config.environment,
        "Starting Credits API Server"
    );

    let state = wiring::build_state(config.clone(), MemoryBackend::default())?;
    let app = create_router(state);

    let addr: SocketAddr = config.server_addr().parse()?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// This enables graceful shutdown of the server, allowing in-flight
/// requests to complete before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
