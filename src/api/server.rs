use std::future::Future;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info};

use super::{
    services::{get_info, get_result, health, submit_fossil},
    state::AppState,
};
use crate::config::Config;
use crate::fossilizer::Fossilizer;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes, with state attached
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/fossils", post(submit_fossil))
        .route("/results/{data}", get(get_result))
        .route("/info", get(get_info))
        .route("/health", get(health))
        .with_state(state)
        // Handles Content-Encoding on request bodies
        .layer(RequestDecompressionLayer::new())
}

/// Run the fossilizer and its HTTP API until Ctrl+C or SIGTERM
pub async fn run(config: Config) -> Result<(), AnyError> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_tx.send_replace(true);
    });
    serve(config, wait_for(shutdown_rx.clone()), wait_for(shutdown_rx)).await
}

/// Run with explicit shutdown futures for the HTTP server and the fossilizer
pub async fn serve<S, F>(config: Config, server_shutdown: S, fossilizer_shutdown: F) -> Result<(), AnyError>
where
    S: Future<Output = ()> + Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    info!(path = %config.fossilizer.path.display(), "Opening fossilizer");
    let fossilizer = Fossilizer::new(config.fossilizer.clone())
        .map_err(|e| format!("Failed to create fossilizer: {}", e))?;

    let address = config.server.bind_addr;
    let state = AppState::new(config, fossilizer.clone());

    let scheduler = tokio::spawn({
        let fossilizer = fossilizer.clone();
        async move { fossilizer.start(fossilizer_shutdown).await }
    });
    fossilizer.started().await;

    let listener = TcpListener::bind(address).await?;
    info!(%address, "batchfossil API listening");

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(server_shutdown)
        .await?;

    match scheduler.await? {
        Err(e) if e.is_stopped() => Ok(()),
        Err(e) => Err(e.into()),
        Ok(()) => Ok(()),
    }
}

async fn wait_for(mut rx: watch::Receiver<bool>) {
    // A dropped sender also means shut down
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
