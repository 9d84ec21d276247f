//! pollen-api - Read-only HTTP service over the pollen store
//!
//! Opens the collector's database read-only and serves pollen types,
//! locations and samples as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::ServiceExt;
use clap::Parser;
use pollen_api::{build_service, AppState};
use pollen_common::config::{resolve_config_path, PollenConfig};
use pollen_common::db::connect_readonly;
use pollen_common::logging::init_logging;
use tracing::{error, info, warn};

/// Command-line arguments for pollen-api
#[derive(Parser, Debug)]
#[command(name = "pollen-api")]
#[command(about = "Serves pollen counts and predictions over HTTP")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "POLLEN_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides `database_path` from the configuration)
    #[arg(short, long, env = "POLLEN_DATABASE")]
    database: Option<PathBuf>,

    /// Listen address (overrides `[api] bind`)
    #[arg(short, long, env = "POLLEN_API_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = PollenConfig::load(&config_path)?;

    init_logging(&config.logging).context("Failed to initialize logging")?;

    // Log build identification immediately after tracing init
    info!(
        "Starting pollen-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if !config_path.exists() {
        warn!("Config file {} not found, using built-in defaults", config_path.display());
    }

    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(bind) = args.bind {
        config.api.bind = bind;
    }

    info!("Database path: {}", config.database_path.display());
    let pool = match connect_readonly(&config.database_path).await {
        Ok(pool) => {
            info!("Connected to database (read-only)");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    let app = build_service(AppState::new(pool));

    let listener = tokio::net::TcpListener::bind(config.api.bind.as_str())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.bind))?;
    info!("pollen-api listening on http://{}", config.api.bind);
    info!("Health check: http://{}/health", config.api.bind);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;

    Ok(())
}
