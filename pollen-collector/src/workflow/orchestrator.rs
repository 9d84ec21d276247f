//! Ingestion orchestrator
//!
//! Two modes:
//!
//! - **full history**: fetch the historical prediction dataset once and
//!   full-upsert every row
//! - **daily**: two independent branches running concurrently
//!   - prediction: tomorrow's predictions, prediction-only upserts dated tomorrow
//!   - count: today's observed counts (scraped chart or feed), count-only
//!     upserts dated today
//!
//! Branches share nothing but the connection pool. A failure inside one
//! branch is logged and recorded in the [`RunReport`]; it never rolls back
//! or stops the other branch. The exception is a fatal configuration error
//! (rejected credentials, missing key), which cancels the shared token so the
//! sibling stops before its next fetch.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use pollen_common::config::{CountSource, PollenConfig};
use pollen_common::db::{locations, samples};
use pollen_common::{time, Location, PollenSample, PollenType};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{IngestError, IngestResult};
use crate::normalizer;
use crate::services::FeedSnapshot;
use crate::types::{FeedSource, PredictionSource, ScrapeSource};
use crate::workflow::report::{Branch, BranchReport, RunReport};

/// Upstream adapters used by a run
#[derive(Clone)]
pub struct Sources {
    pub prediction: Arc<dyn PredictionSource>,
    pub scrape: Arc<dyn ScrapeSource>,
    pub feed: Arc<dyn FeedSource>,
}

/// Result of one (pollen type, location) pair in the count branch
struct PairOutcome {
    context: String,
    written: usize,
    result: IngestResult<()>,
    cancelled: bool,
}

/// Drives adapters, normalizer and store merges
#[derive(Clone)]
pub struct IngestOrchestrator {
    db: SqlitePool,
    config: Arc<PollenConfig>,
    sources: Sources,
}

impl IngestOrchestrator {
    pub fn new(db: SqlitePool, config: PollenConfig, sources: Sources) -> Self {
        Self {
            db,
            config: Arc::new(config),
            sources,
        }
    }

    /// Backfill from the historical prediction dataset
    pub async fn run_full_history(&self) -> RunReport {
        let mut branch = BranchReport::new(Branch::FullHistory);
        info!("Collecting full history");

        let batch = match self.sources.prediction.fetch_historical().await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "Historical prediction fetch failed");
                branch.fail("historical dataset", e);
                return RunReport { branches: vec![branch] };
            }
        };
        branch.skipped = batch.skipped;
        info!(rows = batch.rows.len(), skipped = batch.skipped, "Found historical samples");

        let prediction = &self.config.prediction;
        let location = match self.load_location(prediction.default_location_id).await {
            Ok(location) => location,
            Err(e) => {
                error!(error = %e, "Default location unavailable");
                branch.fail("default location", e);
                return RunReport { branches: vec![branch] };
            }
        };

        for row in &batch.rows {
            let sample = normalizer::historical_sample(row, prediction.historical_pollen_type, &location);
            match self.merge(&sample).await {
                Ok(()) => branch.written += 1,
                Err(e) => {
                    warn!(key = %sample.key(), error = %e, "Historical sample merge failed");
                    branch.fail(sample.key().to_string(), e);
                }
            }
        }

        info!("{}", branch);
        RunReport { branches: vec![branch] }
    }

    /// Daily run for the current UTC day
    pub async fn run_daily(&self) -> RunReport {
        self.run_daily_at(time::today()).await
    }

    /// Daily run as if today were `today`
    pub async fn run_daily_at(&self, today: NaiveDate) -> RunReport {
        let token = CancellationToken::new();
        info!(%today, count_source = ?self.config.daily.count_source, "Starting daily run");

        let prediction_task = {
            let this = self.clone();
            let token = token.clone();
            tokio::spawn(async move { this.prediction_branch(today, &token).await })
        };
        let count_task = {
            let this = self.clone();
            let token = token.clone();
            tokio::spawn(async move { this.count_branch(today, &token).await })
        };

        let (prediction, count) = tokio::join!(prediction_task, count_task);

        let mut report = RunReport::default();
        for (branch, joined) in [(Branch::Prediction, prediction), (Branch::Count, count)] {
            match joined {
                Ok(branch_report) => report.branches.push(branch_report),
                Err(e) => {
                    error!(%branch, error = %e, "Branch task panicked");
                    let mut branch_report = BranchReport::new(branch);
                    branch_report.fail("task", IngestError::Fetch(format!("branch task failed: {}", e)));
                    report.branches.push(branch_report);
                }
            }
        }

        for branch in &report.branches {
            info!("{}", branch);
        }
        report
    }

    /// Tomorrow's predictions as prediction-only upserts
    pub(crate) async fn prediction_branch(&self, today: NaiveDate, token: &CancellationToken) -> BranchReport {
        let mut branch = BranchReport::new(Branch::Prediction);
        if token.is_cancelled() {
            branch.cancelled = true;
            return branch;
        }

        let predictions = match self.sources.prediction.fetch_tomorrow().await {
            Ok(predictions) => predictions,
            Err(e) => {
                self.record_branch_error(&mut branch, "tomorrow's prediction", e, token);
                return branch;
            }
        };

        let location = match self.load_location(self.config.prediction.default_location_id).await {
            Ok(location) => location,
            Err(e) => {
                self.record_branch_error(&mut branch, "default location", e, token);
                return branch;
            }
        };

        let tomorrow = time::next_day(today);
        for prediction in &predictions {
            let sample = normalizer::prediction_sample(prediction, tomorrow, &location);
            match self.merge(&sample).await {
                Ok(()) => branch.written += 1,
                Err(e) => {
                    warn!(key = %sample.key(), error = %e, "Prediction merge failed");
                    branch.fail(sample.key().to_string(), e);
                }
            }
        }

        branch
    }

    /// Today's observed counts as count-only upserts
    pub(crate) async fn count_branch(&self, today: NaiveDate, token: &CancellationToken) -> BranchReport {
        let mut branch = BranchReport::new(Branch::Count);

        let known = match locations::list_locations(&self.db).await {
            Ok(known) => known,
            Err(e) => {
                self.record_branch_error(&mut branch, "locations", e.into(), token);
                return branch;
            }
        };

        let outcomes = match self.config.daily.count_source {
            CountSource::Scrape => {
                let pairs = self.scrape_pairs(&known);
                join_all(pairs.into_iter().map(|(pollen_type, location, station_id, type_id)| {
                    self.scrape_pair(pollen_type, location, station_id, type_id, today, token)
                }))
                .await
            }
            CountSource::Feed => {
                let pairs = self.feed_pairs(&known);
                if pairs.is_empty() {
                    Vec::new()
                } else if token.is_cancelled() {
                    branch.cancelled = true;
                    return branch;
                } else {
                    // One document carries every location's counts
                    let snapshot = match self.sources.feed.fetch_snapshot().await {
                        Ok(snapshot) => snapshot,
                        Err(e) => {
                            self.record_branch_error(&mut branch, "feed document", e, token);
                            return branch;
                        }
                    };
                    join_all(pairs.into_iter().map(|(pollen_type, location, title, key)| {
                        self.feed_pair(pollen_type, location, title, key, &snapshot, today)
                    }))
                    .await
                }
            }
        };

        if outcomes.is_empty() {
            warn!("No (pollen type, location) pair is mapped to the count source");
        }

        for outcome in outcomes {
            branch.written += outcome.written;
            branch.cancelled |= outcome.cancelled;
            if let Err(e) = outcome.result {
                self.record_branch_error(&mut branch, outcome.context, e, token);
            }
        }

        branch
    }

    /// (type, location, station, type code) for every mapped pair
    fn scrape_pairs<'a>(&self, known: &'a [Location]) -> Vec<(PollenType, &'a Location, u32, u32)> {
        let scrape = &self.config.scrape;
        known
            .iter()
            .filter_map(|location| scrape.station_for(location.id).map(|station| (location, station)))
            .flat_map(|(location, station)| {
                PollenType::ALL.into_iter().filter_map(move |pollen_type| {
                    scrape
                        .type_id_for(pollen_type)
                        .map(|type_id| (pollen_type, location, station, type_id))
                })
            })
            .collect()
    }

    /// (type, location, feed title, feed key) for every mapped pair
    fn feed_pairs<'a>(&'a self, known: &'a [Location]) -> Vec<(PollenType, &'a Location, &'a str, &'a str)> {
        let feed = &self.config.feed;
        known
            .iter()
            .filter_map(|location| feed.title_for(location.id).map(|title| (location, title)))
            .flat_map(|(location, title)| {
                feed.pollen_keys
                    .iter()
                    .map(move |(pollen_type, key)| (*pollen_type, location, title, key.as_str()))
            })
            .collect()
    }

    async fn scrape_pair(
        &self,
        pollen_type: PollenType,
        location: &Location,
        station_id: u32,
        type_id: u32,
        today: NaiveDate,
        token: &CancellationToken,
    ) -> PairOutcome {
        let context = format!("{}/location {} (station {})", pollen_type.key(), location.id, station_id);
        let mut outcome = PairOutcome {
            context,
            written: 0,
            result: Ok(()),
            cancelled: false,
        };

        if token.is_cancelled() {
            outcome.cancelled = true;
            return outcome;
        }

        let series = match self.sources.scrape.fetch_series(station_id, type_id).await {
            Ok(series) => series,
            Err(e) => {
                outcome.result = Err(e);
                return outcome;
            }
        };

        let Some(latest) = series.last() else {
            outcome.result = Err(IngestError::NotFound("Chart series has no points".to_string()));
            return outcome;
        };

        if let Err(e) = sanity_check(latest.date, today, self.config.scrape.max_staleness_hours) {
            outcome.result = Err(e);
            return outcome;
        }

        let pending = normalizer::scraped_samples(
            &series,
            pollen_type,
            location,
            today,
            self.config.scrape.catch_up_days,
        );
        debug!(pair = %outcome.context, latest = %latest.date, samples = pending.len(), "Merging scraped counts");

        for sample in &pending {
            if let Err(e) = self.merge(sample).await {
                outcome.result = Err(e);
                return outcome;
            }
            outcome.written += 1;
        }

        outcome
    }

    async fn feed_pair(
        &self,
        pollen_type: PollenType,
        location: &Location,
        title: &str,
        key: &str,
        snapshot: &FeedSnapshot,
        today: NaiveDate,
    ) -> PairOutcome {
        let context = format!("{}/location {} (feed '{}')", pollen_type.key(), location.id, title);
        let mut outcome = PairOutcome {
            context,
            written: 0,
            result: Ok(()),
            cancelled: false,
        };

        let count = match snapshot.count(title, key) {
            Ok(count) => count,
            Err(e) => {
                outcome.result = Err(e);
                return outcome;
            }
        };

        let sample = normalizer::count_sample(today, pollen_type, location, count);
        match self.merge(&sample).await {
            Ok(()) => outcome.written = 1,
            Err(e) => outcome.result = Err(e),
        }

        outcome
    }

    fn record_branch_error(
        &self,
        branch: &mut BranchReport,
        context: impl Into<String>,
        e: IngestError,
        token: &CancellationToken,
    ) {
        let context = context.into();
        if e.is_fatal() {
            error!(branch = %branch.branch, context = %context, error = %e, "Fatal configuration error, cancelling run");
            token.cancel();
        } else {
            warn!(branch = %branch.branch, context = %context, error = %e, "Ingestion failed");
        }
        branch.fail(context, e);
    }

    async fn load_location(&self, id: i64) -> IngestResult<Location> {
        locations::get_location(&self.db, id)
            .await?
            .ok_or(IngestError::Store(pollen_common::Error::UnknownLocation(id)))
    }

    async fn merge(&self, sample: &PollenSample) -> IngestResult<()> {
        samples::merge_sample(&self.db, sample).await?;
        Ok(())
    }
}

/// Reject a latest point that cannot be today's count
///
/// Dates are whole UTC days, so the lag is measured midnight to midnight.
pub fn sanity_check(latest: NaiveDate, today: NaiveDate, max_staleness_hours: i64) -> IngestResult<()> {
    let lag_hours = (today - latest).num_hours();
    if lag_hours > max_staleness_hours {
        return Err(IngestError::SanityCheck {
            latest,
            today,
            max_staleness_hours,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HistoricalBatch, HistoricalPollenCount, PollenPrediction};
    use async_trait::async_trait;
    use pollen_common::db::init_database;
    use tempfile::TempDir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct StaticSources;

    #[async_trait]
    impl PredictionSource for StaticSources {
        async fn fetch_tomorrow(&self) -> IngestResult<Vec<PollenPrediction>> {
            Ok(vec![PollenPrediction { pollen_type: PollenType::Grass, predicted_count: 1.0 }])
        }
        async fn fetch_historical(&self) -> IngestResult<HistoricalBatch> {
            Ok(HistoricalBatch::default())
        }
    }

    #[async_trait]
    impl ScrapeSource for StaticSources {
        async fn fetch_series(&self, _station_id: u32, _type_id: u32) -> IngestResult<Vec<HistoricalPollenCount>> {
            Ok(vec![HistoricalPollenCount { date: day(2021, 6, 1), count: 3 }])
        }
    }

    #[async_trait]
    impl FeedSource for StaticSources {
        async fn fetch_snapshot(&self) -> IngestResult<FeedSnapshot> {
            Ok(FeedSnapshot::from_items([("københavn", "græs:4;birk:-")]))
        }
    }

    async fn orchestrator() -> (TempDir, IngestOrchestrator) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("pollen.db")).await.unwrap();
        let sources = Sources {
            prediction: Arc::new(StaticSources),
            scrape: Arc::new(StaticSources),
            feed: Arc::new(StaticSources),
        };
        (dir, IngestOrchestrator::new(pool, PollenConfig::default(), sources))
    }

    #[test]
    fn test_sanity_check_allows_one_day_lag() {
        assert!(sanity_check(day(2021, 6, 1), day(2021, 6, 2), 24).is_ok());
        assert!(sanity_check(day(2021, 6, 2), day(2021, 6, 2), 24).is_ok());
    }

    #[test]
    fn test_sanity_check_rejects_older_points() {
        let result = sanity_check(day(2021, 5, 31), day(2021, 6, 2), 24);
        assert!(matches!(result, Err(IngestError::SanityCheck { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_branches_before_fetch() {
        let (_dir, orchestrator) = orchestrator().await;
        let token = CancellationToken::new();
        token.cancel();

        let prediction = orchestrator.prediction_branch(day(2021, 6, 2), &token).await;
        let count = orchestrator.count_branch(day(2021, 6, 2), &token).await;

        assert!(prediction.cancelled);
        assert!(count.cancelled);
        assert_eq!(prediction.written + count.written, 0);
    }

    #[tokio::test]
    async fn test_scrape_pairs_follow_mappings() {
        let (_dir, orchestrator) = orchestrator().await;
        let known = vec![
            Location { id: 0, city: "Copenhagen".into(), country: "Denmark".into() },
            Location { id: 5, city: "Aarhus".into(), country: "Denmark".into() },
        ];

        let pairs = orchestrator.scrape_pairs(&known);
        let codes: Vec<(PollenType, i64, u32, u32)> = pairs
            .iter()
            .map(|(t, l, station, type_id)| (*t, l.id, *station, *type_id))
            .collect();
        // Location 5 has no station mapping
        assert_eq!(codes, vec![(PollenType::Grass, 0, 48, 28), (PollenType::Birch, 0, 48, 7)]);
    }

    #[tokio::test]
    async fn test_daily_run_writes_both_branches() {
        let (_dir, orchestrator) = orchestrator().await;

        let report = orchestrator.run_daily_at(day(2021, 6, 2)).await;

        assert_eq!(report.status(), crate::workflow::RunStatus::Success);
        assert_eq!(report.branch(Branch::Prediction).map(|b| b.written), Some(1));
        // grass and birch for the default station
        assert_eq!(report.branch(Branch::Count).map(|b| b.written), Some(2));
    }
}
