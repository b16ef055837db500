use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use roomcast_adapter::{EmitFailure, RoomRegistry, RoomcastAdapter};
use roomcast_core::config::RoomcastConfig;
use tracing::{info, warn};

mod app;
mod http;
mod ws;

/// WebSocket front end for cross-instance room broadcast.
#[derive(Debug, Parser)]
#[command(name = "roomcast-gateway", version, about)]
struct Args {
    /// Path to roomcast.toml (falls back to ROOMCAST_CONFIG, then ./roomcast.toml).
    #[arg(long)]
    config: Option<String>,

    /// Override gateway.port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // load config: --config > ROOMCAST_CONFIG env > ./roomcast.toml
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("ROOMCAST_CONFIG").ok());
    let loaded = RoomcastConfig::load(config_path.as_deref());
    let filter = loaded
        .as_ref()
        .map(|c| c.log.filter.clone())
        .unwrap_or_else(|_| roomcast_core::config::DEFAULT_LOG_FILTER.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    let mut config = loaded.unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        RoomcastConfig::default()
    });
    if let Some(port) = args.port {
        config.gateway.port = port;
    }

    let emit_failures = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&emit_failures);
    let on_failure = move |_: &EmitFailure| {
        counter.fetch_add(1, Ordering::Relaxed);
    };
    let registry = Arc::new(RoomRegistry::with_emit_failure_hook(Arc::new(on_failure)));

    info!(url = %config.broker.redis_url(), "connecting to broker");
    let adapter = RoomcastAdapter::connect_redis(&config.broker, registry)?;

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, adapter, emit_failures));
    let router = app::build_router(state.clone());

    info!(instance = %state.adapter.identity(), "Roomcast gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.adapter.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
