use std::net::SocketAddr;

use dotenv::dotenv;
use tokio::signal;

use lume_payment_server::app::{build_router, AppState};
use lume_payment_server::config::ServerConfig;

#[tokio::main]
async fn main() {
    // Load environment variables from .env if available
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let mode = config.mode;
    let webhook_verification = config.webhook_secret.is_some();

    let state = AppState::new(config);
    let app = build_router(state);

    tracing::info!(
        %addr,
        ?mode,
        webhook_verification,
        "payment server listening"
    );
    tracing::info!("   POST /payments/create-intent");
    tracing::info!("   POST /payments/webhook");
    tracing::info!("   GET  /payments/:reference/status");
    tracing::info!("   GET  /health");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping gracefully");
}
