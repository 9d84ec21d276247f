//! Database initialization
//!
//! The collector owns the database: it opens it read-write, creates it on
//! first run and applies the schema. The API only ever opens it read-only.

use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Current schema version
///
/// **IMPORTANT:** Increment this when the schema changes
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Id and name of the location every single-location upstream refers to
const DEFAULT_LOCATION: (i64, &str, &str) = (0, "Copenhagen", "Denmark");

/// Open (creating if needed) the database read-write and apply the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // WAL lets the read-only API keep serving while the collector writes.
    // Foreign keys are a per-connection setting, so they go on the connect options.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Connect to an existing database in read-only mode
///
/// Not `immutable`: the collector may write while the API is running.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::NotFound(format!(
            "Database not found: {}. Run pollen-collector first to initialize it.",
            db_path.display()
        )));
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .read_only(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    debug!("Connected read-only to {}", db_path.display());
    Ok(pool)
}

/// Create tables and seed reference data (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_locations_table(pool).await?;
    create_pollen_samples_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await?;

    debug!(version = CURRENT_SCHEMA_VERSION, "Database schema ready");
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_locations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY,
            city TEXT NOT NULL,
            country TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Seed the default location if it doesn't exist
    let (id, city, country) = DEFAULT_LOCATION;
    sqlx::query("INSERT OR IGNORE INTO locations (id, city, country) VALUES (?, ?, ?)")
        .bind(id)
        .bind(city)
        .bind(country)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_pollen_samples_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pollen_samples (
            date TEXT NOT NULL,
            pollen_type INTEGER NOT NULL,
            location_id INTEGER NOT NULL REFERENCES locations(id),
            observed_count INTEGER,
            predicted_count REAL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (date, pollen_type, location_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Range lookups are per (type, location) ordered by date
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pollen_samples_series
         ON pollen_samples (pollen_type, location_id, date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
