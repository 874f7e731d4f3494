use anyhow::Context;
use dockhand_engine::DockerEngine;
use dockhand_gateway_server::{create_app, AppState, LogFormat, ServerConfig};
use dockhand_orchestrator::Orchestrator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,dockhand_gateway_server=debug,dockhand_orchestrator=debug";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        // Without a signal handler, only an external cancel stops the server
        token.cancelled().await;
    }
    info!("Shutdown requested");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    info!("Starting dockhand...");

    let engine = DockerEngine::connect(config.docker_socket.as_deref())
        .context("failed to create Docker client")?;
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(engine),
        config.orchestrator.clone(),
    ));
    if !orchestrator.engine_healthy().await {
        warn!("Docker engine is not reachable yet; requests will fail until it is");
    }
    info!(
        cpu_mode = ?config.orchestrator.cpu_strategy,
        stop_timeout_secs = config.orchestrator.stop_timeout.as_secs(),
        registries = config.orchestrator.registry_auth.len(),
        "Orchestrator ready"
    );

    let state = AppState::new(orchestrator);
    let shutdown = state.shutdown.clone();
    let app = create_app(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("dockhand listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}
