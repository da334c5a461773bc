//! Server startup and lifecycle

use crate::{node_server, routes, AppState, GatewayConfig, NodeServerConfig, NodeState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run the gateway server
pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    run_server_with_shutdown(config, std::future::pending()).await
}

/// Run the gateway server until `shutdown_signal` resolves
pub async fn run_server_with_shutdown(
    config: GatewayConfig,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone()).await?);
    let app = routes::create_router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;

    info!(
        addr = %addr,
        replication = config.default_replication_factor,
        seeds = config.nodes.len(),
        "minis3 gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("gateway shutdown complete");
    Ok(())
}

/// Run a storage node server
pub async fn run_node_server(config: NodeServerConfig) -> anyhow::Result<()> {
    run_node_server_with_shutdown(config, std::future::pending()).await
}

/// Run a storage node server until `shutdown_signal` resolves
pub async fn run_node_server_with_shutdown(
    config: NodeServerConfig,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = Arc::new(NodeState::new(config.clone()).await?);
    let app = node_server::create_node_router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;

    info!(
        addr = %addr,
        base_dir = %config.base_dir.display(),
        "minis3 storage node listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("storage node shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
