//! Database Test Utilities

use anyhow::Result;
use chrono::NaiveDate;
use pollen_common::db::init_database;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Raw `pollen_samples` row: (date, pollen_type, location_id, observed, predicted)
pub type SampleRow = (NaiveDate, i64, i64, Option<i32>, Option<f64>);

/// Create temporary test database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = init_database(&temp_dir.path().join("test_pollen.db")).await?;
    Ok((temp_dir, pool))
}

/// Every stored sample, ordered by key
pub async fn fetch_all_rows(pool: &SqlitePool) -> Result<Vec<SampleRow>> {
    let rows = sqlx::query_as(
        "SELECT date, pollen_type, location_id, observed_count, predicted_count
         FROM pollen_samples ORDER BY date, pollen_type, location_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}
