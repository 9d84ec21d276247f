//! In-process source adapters with canned answers

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pollen_collector::types::{
    FeedSource, HistoricalBatch, HistoricalPollenCount, PollenPrediction, PredictionSource, ScrapeSource,
};
use pollen_collector::services::FeedSnapshot;
use pollen_collector::{IngestError, IngestResult};

type Canned<T> = Box<dyn Fn() -> IngestResult<T> + Send + Sync>;

/// Prediction source answering from closures
pub struct MockPrediction {
    tomorrow: Canned<Vec<PollenPrediction>>,
    historical: Canned<HistoricalBatch>,
}

impl MockPrediction {
    pub fn returning(predictions: Vec<PollenPrediction>) -> Self {
        Self {
            tomorrow: Box::new(move || Ok(predictions.clone())),
            historical: Box::new(|| Ok(HistoricalBatch::default())),
        }
    }

    pub fn failing(make_error: fn() -> IngestError) -> Self {
        Self {
            tomorrow: Box::new(move || Err(make_error())),
            historical: Box::new(move || Err(make_error())),
        }
    }
}

#[async_trait]
impl PredictionSource for MockPrediction {
    async fn fetch_tomorrow(&self) -> IngestResult<Vec<PollenPrediction>> {
        (self.tomorrow)()
    }

    async fn fetch_historical(&self) -> IngestResult<HistoricalBatch> {
        (self.historical)()
    }
}

/// Scrape source keyed by upstream type code; unknown codes fail
#[derive(Default)]
pub struct MockScrape {
    series: HashMap<u32, Vec<HistoricalPollenCount>>,
    pub calls: AtomicUsize,
}

impl MockScrape {
    pub fn with_series(mut self, type_id: u32, series: Vec<HistoricalPollenCount>) -> Self {
        self.series.insert(type_id, series);
        self
    }
}

#[async_trait]
impl ScrapeSource for MockScrape {
    async fn fetch_series(&self, _station_id: u32, type_id: u32) -> IngestResult<Vec<HistoricalPollenCount>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.series
            .get(&type_id)
            .cloned()
            .ok_or_else(|| IngestError::ScrapeFormat(format!("no chart for type {}", type_id)))
    }
}

/// Feed source serving one fixed document
#[derive(Default)]
pub struct MockFeed {
    items: Vec<(String, String)>,
    pub calls: AtomicUsize,
}

impl MockFeed {
    pub fn with_item(mut self, title: &str, description: &str) -> Self {
        self.items.push((title.to_string(), description.to_string()));
        self
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    async fn fetch_snapshot(&self) -> IngestResult<FeedSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FeedSnapshot::from_items(
            self.items.iter().map(|(title, description)| (title.as_str(), description.as_str())),
        ))
    }
}
