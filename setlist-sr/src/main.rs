//! Suggestion Resolver (setlist-sr) - Main entry point
//!
//! HTTP microservice that resolves natural-language playlist prompts into
//! catalog-verified song lists, streamed to the caller over SSE.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use setlist_sr::config::SrConfig;
use setlist_sr::services::catalog_client::CatalogClient;
use setlist_sr::services::generation_client::GenerationClient;
use setlist_sr::services::token_provider::ClientCredentialsProvider;
use setlist_sr::AppState;

/// Command-line arguments for setlist-sr
#[derive(Parser, Debug)]
#[command(name = "setlist-sr")]
#[command(about = "Suggestion Resolver microservice for Setlist")]
#[command(version)]
struct Args {
    /// Path to a TOML config file (overrides the default search locations)
    #[arg(short, long, env = "SETLIST_SR_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "setlist_sr=debug,setlist_common=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    info!("Starting Setlist Suggestion Resolver");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config =
        SrConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }

    info!("Generation service: {} (model {})", config.generation.api_base, config.generation.model);
    info!("Catalog service: {}", config.catalog.api_base);

    // Wire up the external service clients
    let tokens = Arc::new(
        ClientCredentialsProvider::new(&config.catalog)
            .context("Failed to create catalog token provider")?,
    );
    let catalog = Arc::new(
        CatalogClient::new(&config.catalog, tokens.clone())
            .context("Failed to create catalog client")?,
    );
    let generation = Arc::new(
        GenerationClient::new(&config.generation)
            .context("Failed to create generation client")?,
    );
    info!("External service clients initialized");

    let state = AppState::new(generation, catalog, tokens);
    let app = setlist_sr::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
