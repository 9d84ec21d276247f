//! Adapter results to canonical samples
//!
//! Adapters never know the full sample identity. The orchestrator passes in
//! the date of insertion, the pollen type and the location it fetched for.

use chrono::{Days, NaiveDate};
use pollen_common::{Location, PollenSample, PollenType};

use crate::types::{HistoricalPollenCount, HistoricalPredictionRow, PollenPrediction};

/// Prediction-only sample for `date` (tomorrow in daily runs)
pub fn prediction_sample(prediction: &PollenPrediction, date: NaiveDate, location: &Location) -> PollenSample {
    PollenSample {
        date,
        pollen_type: prediction.pollen_type,
        location: location.clone(),
        observed_count: None,
        predicted_count: Some(prediction.predicted_count),
    }
}

/// Count-only sample
pub fn count_sample(date: NaiveDate, pollen_type: PollenType, location: &Location, count: i32) -> PollenSample {
    PollenSample {
        date,
        pollen_type,
        location: location.clone(),
        observed_count: Some(count),
        predicted_count: None,
    }
}

/// Full sample from a historical backfill row
pub fn historical_sample(row: &HistoricalPredictionRow, pollen_type: PollenType, location: &Location) -> PollenSample {
    PollenSample {
        date: row.date,
        pollen_type,
        location: location.clone(),
        observed_count: Some(row.observed_count),
        predicted_count: Some(row.predicted_count),
    }
}

/// Count-only samples from a scraped series
///
/// The latest point is stored under `today`. With `catch_up_days > 0`, every
/// other point dated within `[today - catch_up_days, today)` is also returned
/// under its own date. `series` must be sorted ascending.
pub fn scraped_samples(
    series: &[HistoricalPollenCount],
    pollen_type: PollenType,
    location: &Location,
    today: NaiveDate,
    catch_up_days: u32,
) -> Vec<PollenSample> {
    let Some((latest, earlier)) = series.split_last() else {
        return Vec::new();
    };

    let window_start = today
        .checked_sub_days(Days::new(u64::from(catch_up_days)))
        .unwrap_or(NaiveDate::MIN);

    let mut samples: Vec<PollenSample> = earlier
        .iter()
        .filter(|point| catch_up_days > 0 && point.date >= window_start && point.date < today)
        .filter(|point| point.date != latest.date)
        .map(|point| count_sample(point.date, pollen_type, location, point.count))
        .collect();

    samples.push(count_sample(today, pollen_type, location, latest.count));
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn copenhagen() -> Location {
        Location { id: 0, city: "Copenhagen".into(), country: "Denmark".into() }
    }

    fn series() -> Vec<HistoricalPollenCount> {
        (1..=5)
            .map(|d| HistoricalPollenCount { date: day(2021, 6, d), count: d as i32 * 10 })
            .collect()
    }

    #[test]
    fn test_latest_point_is_stored_under_today() {
        let samples = scraped_samples(&series(), PollenType::Grass, &copenhagen(), day(2021, 6, 6), 0);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].date, day(2021, 6, 6));
        assert_eq!(samples[0].observed_count, Some(50));
        assert_eq!(samples[0].predicted_count, None);
    }

    #[test]
    fn test_catch_up_window_keeps_own_dates() {
        let samples = scraped_samples(&series(), PollenType::Birch, &copenhagen(), day(2021, 6, 6), 3);
        let dated: Vec<(NaiveDate, Option<i32>)> = samples.iter().map(|s| (s.date, s.observed_count)).collect();
        // Window is [06-03, 06-06); 06-05 is the latest point and goes under today
        assert_eq!(
            dated,
            vec![
                (day(2021, 6, 3), Some(30)),
                (day(2021, 6, 4), Some(40)),
                (day(2021, 6, 6), Some(50)),
            ]
        );
    }

    #[test]
    fn test_empty_series_yields_nothing() {
        assert!(scraped_samples(&[], PollenType::Grass, &copenhagen(), day(2021, 6, 6), 7).is_empty());
    }

    #[test]
    fn test_prediction_sample_is_prediction_only() {
        let prediction = PollenPrediction { pollen_type: PollenType::Birch, predicted_count: 8.5 };
        let sample = prediction_sample(&prediction, day(2021, 6, 7), &copenhagen());
        assert_eq!(sample.observed_count, None);
        assert_eq!(sample.predicted_count, Some(8.5));
        assert_eq!(sample.key().to_string(), "2021-06-07/birch/location 0");
    }

    #[test]
    fn test_historical_sample_carries_both_counts() {
        let row = HistoricalPredictionRow { date: day(2019, 5, 17), observed_count: 22, predicted_count: 18.5 };
        let sample = historical_sample(&row, PollenType::Grass, &copenhagen());
        assert_eq!(sample.observed_count, Some(22));
        assert_eq!(sample.predicted_count, Some(18.5));
    }
}
