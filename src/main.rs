//! Shop Vision server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shop_vision::detection::{Detector, OnnxEngine};
use shop_vision::ledger::{Ledger, LedgerPersistence};
use shop_vision::{create_router, spawn_cleanup_task, AppState, Config};

/// Main entry point for the shop server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the ledger (sled-backed when `LEDGER_DB_PATH` is set)
/// 4. Load the ONNX detector (when `MODEL_PATH` is set) and detection cache
/// 5. Start the background cache sweep
/// 6. Serve HTTP until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" for this crate, RUST_LOG overrides
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shop_vision=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Shop Vision server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_capacity={}, cache_ttl={}ms, port={}, cleanup_interval={}s",
        config.cache_capacity, config.cache_ttl_ms, config.server_port, config.cleanup_interval
    );

    let ledger = match &config.ledger_db_path {
        Some(path) => {
            let persistence = LedgerPersistence::open(path)
                .with_context(|| format!("opening ledger database at {}", path))?;
            info!("Ledger persisted at {}", path);
            Ledger::with_persistence(persistence).context("loading ledger")?
        }
        None => {
            warn!("LEDGER_DB_PATH not set, ledger is kept in memory only");
            Ledger::new()
        }
    };

    let detector = match &config.model_path {
        Some(path) => {
            let engine = OnnxEngine::load(path, config.model_input_size)
                .with_context(|| format!("loading detection model from {}", path))?;
            Detector::new(Arc::new(engine), config.model_input_size, config.nms_threshold)
        }
        None => {
            warn!("MODEL_PATH not set, detection requests will fail");
            Detector::unloaded(config.model_input_size, config.nms_threshold)
        }
    };

    let state = AppState::from_config(&config, ledger, detector);
    let cleanup_handle = spawn_cleanup_task(state.cache.clone(), config.cleanup_interval);

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then stops the cache sweep.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cleanup_handle.abort();
    warn!("Cache sweep task aborted");
}
