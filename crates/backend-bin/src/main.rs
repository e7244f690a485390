// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry point for the account service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use backend_lib::{
    access::create_rpc_router,
    config::{LogFormat, Settings},
    web::create_router,
    AppState,
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "authdb", about = "Account session-authentication service")]
struct Cli {
    /// Config file (defaults to ./authdb.toml when present)
    #[arg(short, long, env = "AUTHDB_CONFIG")]
    config: Option<PathBuf>,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match settings.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Settings::load().context("failed to load config")?,
    };
    settings.validate().context("invalid configuration")?;
    init_tracing(&settings);

    let state = Arc::new(AppState::from_settings(settings)?);
    let http_addr = state.settings.bind_addr;
    let rpc_addr = state.settings.rpc_bind_addr;

    let app = create_router(Arc::clone(&state));
    let rpc = create_rpc_router(state.access_service());

    let http_listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind {http_addr}"))?;
    let rpc_listener = TcpListener::bind(rpc_addr)
        .await
        .with_context(|| format!("failed to bind {rpc_addr}"))?;
    tracing::info!(%http_addr, %rpc_addr, "listening");

    tokio::try_join!(
        async {
            axum::serve(
                http_listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await
        },
        async {
            axum::serve(rpc_listener, rpc)
                .with_graceful_shutdown(shutdown_signal())
                .await
        },
    )?;

    Ok(())
}
