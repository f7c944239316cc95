//! Offline Worker - local proxy entry point
//!
//! Loads configuration, installs the configured cache generation, starts the
//! connectivity probe and serves the proxy until SIGINT/SIGTERM.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_worker::{create_router, spawn_connectivity_task, AppState, Config};

/// Main entry point for the offline worker proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the worker, restoring the sync journal if configured
/// 4. Install the configured cache generation
/// 5. Start the connectivity probe
/// 6. Serve the proxy until a shutdown signal arrives
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_worker=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Offline Worker");

    let config = Config::from_env();
    info!(
        "Configuration loaded: origin={}, cache={}, assets={}, port={}, probe_interval={}s",
        config.origin_url,
        config.cache_name,
        config.precache_manifest.len(),
        config.server_port,
        config.connectivity_interval
    );

    let state = AppState::from_config(&config)
        .await
        .context("failed to build worker")?;

    // An origin that is down at startup is not fatal; install can be retried
    // through POST /__worker/install.
    match state.worker.install().await {
        Ok(report) => info!(
            "Installed '{}' with {} assets (active: {})",
            report.generation, report.assets, report.activated
        ),
        Err(e) => error!("Initial install failed: {}", e),
    }

    let probe_handle = if config.connectivity_interval > 0 {
        Some(spawn_connectivity_task(
            state.worker.clone(),
            config.connectivity_interval,
        ))
    } else {
        info!("Connectivity probe disabled");
        None
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Proxy listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(probe_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the probe.
async fn shutdown_signal(probe_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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

    if let Some(handle) = probe_handle {
        handle.abort();
        warn!("Connectivity probe aborted");
    }
}
