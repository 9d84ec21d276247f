//! pollen-api library - read-only HTTP surface over the pollen store
//!
//! Serves pollen types, locations and samples as JSON. The service never
//! writes: its pool is opened read-only and the collector owns the database.

use axum::Router;
use sqlx::SqlitePool;
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (read-only)
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::pollen_routes())
        .merge(api::location_routes())
        .merge(api::pollen_type_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Router wrapped so that `/api/pollentype/` and `/api/pollentype` route alike
///
/// Path normalization has to run before routing, so it wraps the router
/// instead of being one of its layers.
pub fn build_service(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state))
}
