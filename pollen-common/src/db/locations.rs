//! Location reference data
//!
//! Locations are created out-of-band (schema seed or operator). Ingestion only
//! reads them; a sample naming an unknown location is rejected by the store.

use crate::{Location, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

fn location_from_row(row: &SqliteRow) -> Location {
    Location {
        id: row.get("id"),
        city: row.get("city"),
        country: row.get("country"),
    }
}

/// Load a location by id
pub async fn get_location(pool: &SqlitePool, id: i64) -> Result<Option<Location>> {
    let row = sqlx::query("SELECT id, city, country FROM locations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(location_from_row))
}

/// Find the first location matching country and/or city
///
/// Matching is case-insensitive; an empty argument matches anything.
pub async fn search_location(
    pool: &SqlitePool,
    country: &str,
    city: &str,
) -> Result<Option<Location>> {
    let country = country.trim();
    let city = city.trim();

    let row = sqlx::query(
        r#"
        SELECT id, city, country
        FROM locations
        WHERE (? = '' OR lower(country) = lower(?))
          AND (? = '' OR lower(city) = lower(?))
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(country)
    .bind(country)
    .bind(city)
    .bind(city)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(location_from_row))
}

/// All known locations, ordered by id
pub async fn list_locations(pool: &SqlitePool) -> Result<Vec<Location>> {
    let rows = sqlx::query("SELECT id, city, country FROM locations ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(location_from_row).collect())
}

/// Register a location (operator tooling and tests)
///
/// Re-registering an id updates its city and country.
pub async fn save_location(pool: &SqlitePool, location: &Location) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO locations (id, city, country) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            city = excluded.city,
            country = excluded.country
        "#,
    )
    .bind(location.id)
    .bind(&location.city)
    .bind(&location.country)
    .execute(pool)
    .await?;

    Ok(())
}
