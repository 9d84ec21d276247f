//! pollen-collector library interface
//!
//! Source adapters, the chart extraction stage, the normalizer and the
//! orchestrator that merges everything into the pollen store. The binary in
//! `main.rs` is a thin CLI over [`workflow::IngestOrchestrator`].

pub mod config;
pub mod error;
pub mod extractors;
pub mod normalizer;
pub mod services;
pub mod types;
pub mod workflow;

pub use crate::error::{IngestError, IngestResult};

use std::sync::Arc;

use pollen_common::config::PollenConfig;
use sqlx::SqlitePool;

use crate::services::{FeedClient, PredictionClient, ScrapeClient};
use crate::workflow::{IngestOrchestrator, Sources};

/// Build the production adapters from configuration
///
/// Prediction API keys must already be resolved (see [`config::resolve_prediction_keys`]).
pub fn build_sources(config: &PollenConfig) -> IngestResult<Sources> {
    Ok(Sources {
        prediction: Arc::new(PredictionClient::new(config.prediction.clone(), &config.http)?),
        scrape: Arc::new(ScrapeClient::new(&config.scrape, &config.http)?),
        feed: Arc::new(FeedClient::new(&config.feed, &config.http)?),
    })
}

/// Orchestrator wired to the production adapters
pub fn build_orchestrator(db: SqlitePool, config: PollenConfig) -> IngestResult<IngestOrchestrator> {
    let sources = build_sources(&config)?;
    Ok(IngestOrchestrator::new(db, config, sources))
}
