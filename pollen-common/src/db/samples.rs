//! Pollen sample persistence: the merge contract and lookups
//!
//! Three upsert paths, all keyed by (date, pollen type, location):
//!
//! - [`upsert_observed_count`] writes the observed count and leaves the predicted count alone
//! - [`upsert_predicted_count`] writes the predicted count and leaves the observed count alone
//! - [`upsert_full`] writes both counts unconditionally
//!
//! Each partial upsert is one `INSERT ... ON CONFLICT DO UPDATE` that only
//! assigns its own column, so concurrent count-only and prediction-only writes
//! to the same key cannot lose each other's field. A column never written
//! stays NULL.

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::{Error, Location, PollenSample, PollenType, Result, SampleKey};

/// Which upsert path a merged sample took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePath {
    ObservedOnly,
    PredictedOnly,
    Full,
}

/// Translate a foreign key violation into an unknown-location error
fn map_write_error(err: sqlx::Error, key: &SampleKey) -> Error {
    let is_fk_violation = err
        .as_database_error()
        .map(|db_err| db_err.is_foreign_key_violation())
        .unwrap_or(false);

    if is_fk_violation {
        Error::UnknownLocation(key.location_id)
    } else {
        Error::Database(err)
    }
}

/// Count-only upsert: write the observed count, preserve any predicted count
pub async fn upsert_observed_count(pool: &SqlitePool, key: &SampleKey, count: i32) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pollen_samples (date, pollen_type, location_id, observed_count, updated_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(date, pollen_type, location_id) DO UPDATE SET
            observed_count = excluded.observed_count,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key.date)
    .bind(key.pollen_type.id())
    .bind(key.location_id)
    .bind(count)
    .execute(pool)
    .await
    .map_err(|e| map_write_error(e, key))?;

    debug!(key = %key, count, "Upserted observed count");
    Ok(())
}

/// Prediction-only upsert: write the predicted count, preserve any observed count
pub async fn upsert_predicted_count(
    pool: &SqlitePool,
    key: &SampleKey,
    predicted: f32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pollen_samples (date, pollen_type, location_id, predicted_count, updated_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(date, pollen_type, location_id) DO UPDATE SET
            predicted_count = excluded.predicted_count,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key.date)
    .bind(key.pollen_type.id())
    .bind(key.location_id)
    .bind(f64::from(predicted))
    .execute(pool)
    .await
    .map_err(|e| map_write_error(e, key))?;

    debug!(key = %key, predicted, "Upserted predicted count");
    Ok(())
}

/// Full upsert: write both counts unconditionally
pub async fn upsert_full(
    pool: &SqlitePool,
    key: &SampleKey,
    count: i32,
    predicted: f32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pollen_samples (date, pollen_type, location_id, observed_count, predicted_count, updated_at)
        VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(date, pollen_type, location_id) DO UPDATE SET
            observed_count = excluded.observed_count,
            predicted_count = excluded.predicted_count,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key.date)
    .bind(key.pollen_type.id())
    .bind(key.location_id)
    .bind(count)
    .bind(f64::from(predicted))
    .execute(pool)
    .await
    .map_err(|e| map_write_error(e, key))?;

    debug!(key = %key, count, predicted, "Upserted full sample");
    Ok(())
}

/// Merge a normalized sample, choosing the upsert path from the fields it carries
pub async fn merge_sample(pool: &SqlitePool, sample: &PollenSample) -> Result<MergePath> {
    let key = sample.key();
    match (sample.observed_count, sample.predicted_count) {
        (Some(count), Some(predicted)) => {
            upsert_full(pool, &key, count, predicted).await?;
            Ok(MergePath::Full)
        }
        (Some(count), None) => {
            upsert_observed_count(pool, &key, count).await?;
            Ok(MergePath::ObservedOnly)
        }
        (None, Some(predicted)) => {
            upsert_predicted_count(pool, &key, predicted).await?;
            Ok(MergePath::PredictedOnly)
        }
        (None, None) => Err(Error::InvalidInput(format!(
            "Sample {} carries neither an observed nor a predicted count",
            key
        ))),
    }
}

const SAMPLE_COLUMNS: &str = r#"
    s.date, s.pollen_type, s.observed_count, s.predicted_count,
    l.id AS location_id, l.city, l.country
"#;

fn sample_from_row(row: &SqliteRow) -> Result<PollenSample> {
    let type_id: i64 = row.get("pollen_type");
    let pollen_type = PollenType::from_id(type_id).ok_or_else(|| {
        Error::CorruptRow(format!("pollen_type {} has no matching pollen type", type_id))
    })?;
    let predicted: Option<f64> = row.get("predicted_count");

    Ok(PollenSample {
        date: row.get("date"),
        pollen_type,
        location: Location {
            id: row.get("location_id"),
            city: row.get("city"),
            country: row.get("country"),
        },
        observed_count: row.get("observed_count"),
        predicted_count: predicted.map(|p| p as f32),
    })
}

/// Point lookup by identity key
pub async fn get_sample(pool: &SqlitePool, key: &SampleKey) -> Result<Option<PollenSample>> {
    let sql = format!(
        "SELECT {} FROM pollen_samples s
         JOIN locations l ON l.id = s.location_id
         WHERE s.date = ? AND s.pollen_type = ? AND s.location_id = ?",
        SAMPLE_COLUMNS
    );

    let row = sqlx::query(&sql)
        .bind(key.date)
        .bind(key.pollen_type.id())
        .bind(key.location_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(sample_from_row).transpose()
}

/// Range lookup, both ends inclusive, ascending by date
pub async fn get_samples_in_range(
    pool: &SqlitePool,
    from: NaiveDate,
    to: NaiveDate,
    pollen_type: PollenType,
    location_id: i64,
) -> Result<Vec<PollenSample>> {
    let sql = format!(
        "SELECT {} FROM pollen_samples s
         JOIN locations l ON l.id = s.location_id
         WHERE s.date >= ? AND s.date <= ? AND s.pollen_type = ? AND s.location_id = ?
         ORDER BY s.date ASC",
        SAMPLE_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(from)
        .bind(to)
        .bind(pollen_type.id())
        .bind(location_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(sample_from_row).collect()
}
