//! licman-server - license verification and sync service
//!
//! Configuration priority: command line > environment > TOML file > defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use licman_common::config::{log_source, Config};
use licman_server::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for licman-server
#[derive(Parser, Debug)]
#[command(name = "licman-server")]
#[command(about = "License verification and sync service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "LICMAN_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "LICMAN_BIND")]
    bind: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "LICMAN_CONFIG")]
    config: Option<PathBuf>,

    /// Local license file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Bundled static license snapshot
    #[arg(long)]
    static_file: Option<PathBuf>,

    /// Log filter, e.g. "licman_server=debug"
    #[arg(long, env = "LICMAN_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Loaded before the subscriber exists; the source is logged below
    let (mut config, config_source) =
        Config::load_with_source(args.config.as_deref()).context("Failed to load configuration")?;
    apply_args(&mut config, &args);

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting licman-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    log_source(config_source.as_deref());
    info!("License file: {}", config.sources.file_path.display());
    info!("Static snapshot: {}", config.sources.static_path().display());

    let state = AppState::from_config(&config).context("Failed to initialize license stores")?;
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.server.bind, config.server.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("licman-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(file) = &args.file {
        config.sources.file_path = file.clone();
    }
    if let Some(static_file) = &args.static_file {
        config.sources.static_path = Some(static_file.clone());
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
