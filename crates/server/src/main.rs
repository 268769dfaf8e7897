//! dbprov server binary.

use anyhow::{Context, Result};
use clap::Parser;
use dbprov_core::config::AppConfig;
use dbprov_server::{AppState, create_router};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// dbprov - per-caller database provisioning service
#[derive(Parser, Debug)]
#[command(name = "dbprovd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "DBPROV_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("dbprov v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    dbprov_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let engine = dbprov_engine::from_config(&config.engine)
        .context("failed to initialize database engine")?;

    // Catch bad credentials and unreachable servers before accepting requests.
    engine
        .health_check()
        .await
        .context("database engine health check failed")?;
    tracing::info!(backend = engine.backend_name(), "Database engine connectivity verified");

    let metadata = dbprov_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    let shutdown = CancellationToken::new();
    let state = AppState::new(config.clone(), engine, metadata, shutdown.clone());
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Load configuration from the optional TOML file and `DBPROV_` env vars.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    // DBPROV_CONFIG only names the file and is not itself configuration.
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("DBPROV_") && key != "DBPROV_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: dbprovd --config /path/to/config.toml\n  \
             2. Environment variables: DBPROV_AUTH__API_KEY_HASH=YOUR_KEY_SHA256 \
             DBPROV_ENGINE__TYPE=sqlserver DBPROV_ENGINE__HOST=... dbprovd\n\n\
             See config/server.example.toml for example configuration.\n\
             Set DBPROV_CONFIG env var to specify a default config file path."
        );
    }

    figment
        .merge(Env::prefixed("DBPROV_").split("__"))
        .extract()
        .context("failed to load configuration")
}

/// Resolve on Ctrl+C or SIGTERM, cancelling `shutdown` so that requests
/// still waiting for an instance lock return promptly.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining requests");
    shutdown.cancel();
}
