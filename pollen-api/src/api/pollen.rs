//! Pollen sample endpoints
//!
//! Dates arrive as RFC 3339 timestamps and are truncated to their UTC day.
//! `/api/pollen/:date` still answers callers that omit `pollentype` and
//! `location`: it falls back to grass at location 0 and flags the request
//! with an `X-Obsolete-*` header.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, SecondsFormat};
use pollen_common::db::samples;
use pollen_common::time::{next_day, start_of_day, timestamp_to_date, today};
use pollen_common::{PollenSample, PollenType, SampleKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ApiError, ApiResult, AppState};

pub const OBSOLETE_POLLENTYPE_HEADER: &str = "x-obsolete-pollentype";
pub const OBSOLETE_LOCATION_HEADER: &str = "x-obsolete-location";

/// Location used when a caller leaves it out
const FALLBACK_LOCATION_ID: i64 = 0;

/// One sample as served to clients; unpopulated counts are `null`
#[derive(Debug, Serialize)]
pub struct PollenSampleDto {
    pub date: String,
    pub pollentype: i64,
    pub location: i64,
    pub pollencount: Option<i32>,
    pub predictedpollencount: Option<f32>,
}

impl From<&PollenSample> for PollenSampleDto {
    fn from(sample: &PollenSample) -> Self {
        Self {
            date: start_of_day(sample.date).to_rfc3339_opts(SecondsFormat::Secs, true),
            pollentype: sample.pollen_type.id(),
            location: sample.location.id,
            pollencount: sample.observed_count,
            predictedpollencount: sample.predicted_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SampleQuery {
    pub pollentype: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub pollentype: Option<String>,
    pub location: Option<String>,
}

/// `"tomorrow"` or an RFC 3339 timestamp
fn parse_date_segment(segment: &str, today: NaiveDate) -> ApiResult<NaiveDate> {
    if segment == "tomorrow" {
        return Ok(next_day(today));
    }
    parse_timestamp("date", segment)
}

fn parse_timestamp(name: &str, value: &str) -> ApiResult<NaiveDate> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| timestamp_to_date(&ts))
        .map_err(|e| ApiError::BadRequest(format!("Invalid {} '{}': {}", name, value, e)))
}

fn parse_id(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.parse().ok())
}

/// GET /api/pollen/:date?pollentype=&location=
pub async fn get_pollen(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(query): Query<SampleQuery>,
) -> Response {
    let date = match parse_date_segment(&date, today()) {
        Ok(date) => date,
        Err(e) => return e.into_response(),
    };

    let mut headers = HeaderMap::new();

    let pollen_type_id = parse_id(query.pollentype.as_deref()).unwrap_or_else(|| {
        headers.insert(
            OBSOLETE_POLLENTYPE_HEADER,
            HeaderValue::from_static(
                "Calling this endpoint without declaring pollentype in query is obsolete",
            ),
        );
        PollenType::Grass.id()
    });

    let location_id = parse_id(query.location.as_deref()).unwrap_or_else(|| {
        headers.insert(
            OBSOLETE_LOCATION_HEADER,
            HeaderValue::from_static(
                "Calling this endpoint without declaring location in query is obsolete",
            ),
        );
        FALLBACK_LOCATION_ID
    });

    let result = lookup_sample(&state, date, pollen_type_id, location_id).await;
    (headers, result).into_response()
}

async fn lookup_sample(
    state: &AppState,
    date: NaiveDate,
    pollen_type_id: i64,
    location_id: i64,
) -> ApiResult<Json<PollenSampleDto>> {
    // An id outside the known types simply has no samples
    let pollen_type = PollenType::from_id(pollen_type_id).ok_or(ApiError::NotFound)?;
    let key = SampleKey::new(date, pollen_type, location_id);

    debug!(key = %key, "Looking up sample");

    samples::get_sample(&state.db, &key)
        .await?
        .map(|sample| Json(PollenSampleDto::from(&sample)))
        .ok_or(ApiError::NotFound)
}

/// GET /api/pollen?from=&to=&pollentype=&location=
///
/// Samples in `[from, to]` by UTC day, ascending. Every parameter is required.
pub async fn get_pollen_range(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<PollenSampleDto>>> {
    let from = required(&query.from, "from").and_then(|v| parse_timestamp("from", v))?;
    let to = required(&query.to, "to").and_then(|v| parse_timestamp("to", v))?;

    let pollen_type_raw = required(&query.pollentype, "pollentype")?;
    let pollen_type = parse_id(Some(pollen_type_raw))
        .and_then(PollenType::from_id)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid pollentype: {}", pollen_type_raw)))?;

    let location_raw = required(&query.location, "location")?;
    let location_id = parse_id(Some(location_raw))
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid location: {}", location_raw)))?;

    let samples =
        samples::get_samples_in_range(&state.db, from, to, pollen_type, location_id).await?;

    Ok(Json(samples.iter().map(PollenSampleDto::from).collect()))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> ApiResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest(format!("Missing query parameter: {}", name)))
}

pub fn pollen_routes() -> Router<AppState> {
    Router::new()
        .route("/api/pollen", get(get_pollen_range))
        .route("/api/pollen/:date", get(get_pollen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollen_common::Location;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_tomorrow_is_day_after_today() {
        let date = parse_date_segment("tomorrow", day(2020, 12, 31)).unwrap();
        assert_eq!(date, day(2021, 1, 1));
    }

    #[test]
    fn test_timestamp_truncates_to_utc_day() {
        let date = parse_date_segment("2020-05-18T01:30:00+02:00", day(2020, 1, 1)).unwrap();
        assert_eq!(date, day(2020, 5, 17));
    }

    #[test]
    fn test_bare_date_is_rejected() {
        let result = parse_date_segment("2020-05-18", day(2020, 1, 1));
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_parse_id_rejects_non_integers() {
        assert_eq!(parse_id(Some("1")), Some(1));
        assert_eq!(parse_id(Some("grass")), None);
        assert_eq!(parse_id(Some("")), None);
        assert_eq!(parse_id(None), None);
    }

    #[test]
    fn test_dto_keeps_missing_counts_null() {
        let sample = PollenSample {
            date: day(2020, 6, 1),
            pollen_type: PollenType::Birch,
            location: Location { id: 0, city: "Copenhagen".into(), country: "Denmark".into() },
            observed_count: None,
            predicted_count: Some(12.5),
        };

        let json = serde_json::to_value(PollenSampleDto::from(&sample)).unwrap();
        assert_eq!(json["date"], "2020-06-01T00:00:00Z");
        assert_eq!(json["pollentype"], 1);
        assert_eq!(json["location"], 0);
        assert!(json["pollencount"].is_null());
        assert_eq!(json["predictedpollencount"], 12.5);
    }
}
