//! Transient adapter results and the source traits the orchestrator drives
//!
//! Adapters return these small typed results; none of them carries the full
//! sample identity. The normalizer attaches whatever the fetch context knows
//! (date of insertion, pollen type, location) to turn them into samples.

use async_trait::async_trait;
use chrono::NaiveDate;
use pollen_common::PollenType;

use crate::error::IngestResult;
use crate::services::feed_client::FeedSnapshot;

/// One point of a scraped chart series (no type or location attached)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoricalPollenCount {
    pub date: NaiveDate,
    pub count: i32,
}

/// Tomorrow's forecast for one pollen type at the default location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollenPrediction {
    pub pollen_type: PollenType,
    pub predicted_count: f32,
}

/// One row of the historical prediction dataset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalPredictionRow {
    pub date: NaiveDate,
    pub observed_count: i32,
    pub predicted_count: f32,
}

/// Parsed historical dataset plus the number of rows that were skipped
#[derive(Debug, Clone, Default)]
pub struct HistoricalBatch {
    pub rows: Vec<HistoricalPredictionRow>,
    pub skipped: usize,
}

/// Remote prediction service
#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// Tomorrow's prediction, one entry per pollen type
    async fn fetch_tomorrow(&self) -> IngestResult<Vec<PollenPrediction>>;

    /// Full historical dataset for bulk backfill
    async fn fetch_historical(&self) -> IngestResult<HistoricalBatch>;
}

/// Historical chart scrape, addressed by upstream station and type codes
#[async_trait]
pub trait ScrapeSource: Send + Sync {
    /// Every point of the chart, ascending by date
    async fn fetch_series(&self, station_id: u32, type_id: u32) -> IngestResult<Vec<HistoricalPollenCount>>;
}

/// Syndication feed with today's counts
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// The current feed document, queried per (location, pollen type) pair
    async fn fetch_snapshot(&self) -> IngestResult<FeedSnapshot>;
}
