use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

use api::{create_router, AppState};
use orchestrator::bootstrap::{init_engine, init_identity_store, init_scheduler_core};
use orchestrator::config::Settings;
use orchestrator::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Settings::load().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &config.observability.log_level,
        config.observability.tracing_endpoint.as_deref(),
    )?;
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        backend = ?config.identity_store.backend,
        "Configuration loaded"
    );

    let metrics_handle = telemetry::init_metrics()?;

    let engine = init_engine(&config)?;
    let identity_store = init_identity_store(&config).await?;
    let core = init_scheduler_core(engine.clone(), identity_store.store.clone()).await?;

    let fire_loop = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.start().await })
    };

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .context("Invalid server host")?,
        config.server.port,
    ));

    let state = AppState::new(core, metrics_handle, config);
    let app = create_router(state);

    tracing::info!(addr = %addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    engine.stop();
    if let Err(e) = fire_loop.await {
        tracing::error!(error = %e, "Fire loop task failed");
    }
    if let Some(pool) = identity_store.pool {
        pool.close().await;
    }

    tracing::info!("API server stopped");
    telemetry::shutdown_tracer();

    served.context("HTTP server error")
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Starting graceful shutdown");
}
