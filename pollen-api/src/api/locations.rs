//! Location lookup and search
//!
//! Search is how clients find the location id they pass to the pollen
//! endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use pollen_common::db::locations;
use pollen_common::Location;
use serde::Deserialize;
use tracing::debug;

use crate::{ApiError, ApiResult, AppState};

/// Query parameters for location search
#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
}

/// GET /api/location/:id
pub async fn get_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Location>> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid location id: {}", id)))?;

    locations::get_location(&state.db, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// GET /api/location?country=&city=
///
/// First location matching both non-empty fields, case-insensitively.
pub async fn search_location(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> ApiResult<Json<Location>> {
    if query.country.trim().is_empty() && query.city.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "At least one of country or city is required".to_string(),
        ));
    }

    debug!(country = %query.country, city = %query.city, "Searching location");

    locations::search_location(&state.db, &query.country, &query.city)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/api/location", get(search_location))
        .route("/api/location/:id", get(get_location))
}
