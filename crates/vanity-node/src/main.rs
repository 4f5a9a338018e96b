//! Vanity Node - vanity import path server.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use vanity_node::api::{create_router, AppState};
use vanity_node::config::NodeConfig;
use vanity_node::observability::{init_logging, LogFormat};
use vanity_node::upstream::UpstreamClient;
use vanity_registry::MemoryRegistry;

/// Vanity Node - go-import resolution and git ref pinning
#[derive(Parser, Debug)]
#[command(name = "vanity-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API listen address
    #[arg(long)]
    api_addr: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = NodeConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(addr) = args.api_addr {
        config.api_addr = addr;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(format) = args.log_format.as_deref() {
        config.log_format = LogFormat::parse(format);
    }

    init_logging(&config.log_level, config.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting vanity node");

    let registry = MemoryRegistry::from_entries(config.packages.clone())
        .context("registering configured packages")?;
    let upstream =
        UpstreamClient::new(config.upstream_timeout()).context("building upstream client")?;

    tracing::info!(
        api_addr = %config.api_addr,
        primary_domain = config.primary_domain.as_deref().unwrap_or("-"),
        tls = config.tls,
        upload_pack_mode = ?config.upload_pack_mode,
        packages = registry.len(),
        upstream_timeout_secs = config.upstream_timeout_secs,
        max_advertisement_bytes = config.max_advertisement_bytes,
        "Node configuration"
    );

    let state = AppState::new(Arc::new(registry), upstream, config.service_settings());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.api_addr)
        .await
        .with_context(|| format!("binding {}", config.api_addr))?;

    tracing::info!(addr = %config.api_addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving HTTP")?;

    tracing::info!("Vanity node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
