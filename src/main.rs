//! Ristretto Server - sharded in-memory cache over HTTP
//!
//! Serves a W-TinyLFU cache engine: writes pass a frequency-based admission
//! test, reads and writes lock a single shard, and entries may carry a TTL.

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ristretto::api::{create_router, AppState};
use ristretto::config::Config;
use ristretto::tasks::spawn_cleanup_task;

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build the cache engine and its sketch worker
/// 4. Start background TTL cleanup task
/// 5. Serve the Axum router on the configured address
/// 6. On SIGINT/SIGTERM drain requests, then stop the engine
#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ristretto=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ristretto cache server");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        listen_address = %config.listen_address,
        total_capacity = config.cache.total_capacity,
        shards = config.cache.shard_count,
        window_ratio = config.cache.window_ratio,
        default_ttl = ?config.cache.default_ttl,
        cleanup_interval = config.cleanup_interval,
        "configuration loaded"
    );

    let state = AppState::from_config(&config).context("failed to start cache engine")?;
    let cache = state.cache.clone();

    let cleanup_handle = spawn_cleanup_task(cache.clone(), config.cleanup_interval);

    let app = create_router(state);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    cache.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
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
    warn!("Cleanup task aborted");
}
