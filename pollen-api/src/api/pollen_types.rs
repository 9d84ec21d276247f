//! Pollen type listing

use axum::{routing::get, Json, Router};
use pollen_common::PollenType;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PollenTypeDto {
    pub pollenid: i64,
    pub name: String,
}

impl From<PollenType> for PollenTypeDto {
    fn from(pollen_type: PollenType) -> Self {
        Self {
            pollenid: pollen_type.id(),
            name: pollen_type.to_string(),
        }
    }
}

/// GET /api/pollentype
///
/// Every pollen type the store knows about, in id order.
pub async fn list_pollen_types() -> Json<Vec<PollenTypeDto>> {
    Json(PollenType::ALL.into_iter().map(PollenTypeDto::from).collect())
}

pub fn pollen_type_routes() -> Router<AppState> {
    Router::new().route("/api/pollentype", get(list_pollen_types))
}
