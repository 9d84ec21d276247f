//! pollen-collector - Pollen ingestion job
//!
//! Runs once and exits:
//! - default: daily run (tomorrow's predictions + today's counts)
//! - `--full-history`: backfill from the historical prediction dataset
//!
//! Exit codes: 0 all branches succeeded, 2 partial failure, 1 fatal error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pollen_common::config::{resolve_config_path, CountSource, PollenConfig};
use pollen_common::db::init_database;
use pollen_common::logging::init_logging;
use pollen_collector::config::resolve_prediction_keys;
use pollen_collector::workflow::RunStatus;
use tracing::{error, info, warn};

/// Command-line arguments for pollen-collector
#[derive(Parser, Debug)]
#[command(name = "pollen-collector")]
#[command(about = "Collects pollen counts and predictions into the pollen store")]
#[command(version)]
struct Args {
    /// Backfill from the historical prediction dataset instead of the daily run
    #[arg(long)]
    full_history: bool,

    /// Configuration file
    #[arg(short, long, env = "POLLEN_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides `database_path` from the configuration)
    #[arg(short, long, env = "POLLEN_DATABASE")]
    database: Option<PathBuf>,

    /// Where the daily observed count comes from (scrape or feed)
    #[arg(long)]
    count_source: Option<CountSource>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(status) => ExitCode::from(status.exit_code() as u8),
        Err(e) => {
            // The subscriber may not be installed yet
            error!("{:#}", e);
            eprintln!("pollen-collector: {:#}", e);
            ExitCode::from(RunStatus::Fatal.exit_code() as u8)
        }
    }
}

async fn run(args: Args) -> Result<RunStatus> {
    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = PollenConfig::load(&config_path)?;

    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting pollen-collector v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if config_path.exists() {
        info!("Configuration: {}", config_path.display());
    } else {
        warn!("Config file {} not found, using built-in defaults", config_path.display());
    }

    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(count_source) = args.count_source {
        config.daily.count_source = count_source;
    }
    config.prediction = resolve_prediction_keys(config.prediction);

    info!("Database: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    let orchestrator = pollen_collector::build_orchestrator(pool.clone(), config)
        .context("Failed to build source adapters")?;

    let report = if args.full_history {
        orchestrator.run_full_history().await
    } else {
        orchestrator.run_daily().await
    };

    pool.close().await;

    let status = report.status();
    match status {
        RunStatus::Success => info!(samples = report.samples_written(), "Run complete"),
        RunStatus::PartialFailure => warn!(
            samples = report.samples_written(),
            failures = report.failures().count(),
            "Run finished with failures"
        ),
        RunStatus::Fatal => error!("Run aborted by a fatal configuration error"),
    }

    Ok(status)
}
