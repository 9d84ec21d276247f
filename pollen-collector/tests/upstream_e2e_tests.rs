//! End-to-end runs against local HTTP servers standing in for the upstreams
//!
//! The production adapters are used unchanged; only the URLs in the
//! configuration point at the fixtures.

mod helpers;

use std::collections::{BTreeMap, HashMap};

use axum::extract::Form;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Days;
use helpers::{chart_page, create_test_db, fetch_all_rows, rss_document, spawn_upstream};
use pollen_collector::build_orchestrator;
use pollen_collector::services::FeedClient;
use pollen_collector::workflow::{Branch, RunStatus};
use pollen_collector::IngestError;
use pollen_common::config::{CountSource, FeedLocation, PollenConfig};
use pollen_common::{time, PollenType};
use serde_json::{json, Value};

const API_KEY: &str = "fixture-key";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", API_KEY))
        .unwrap_or(false)
}

async fn predictions(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid key"})));
    }
    assert_eq!(body, json!({"GlobalParameters": {"Output_name": ""}}));
    (
        StatusCode::OK,
        Json(json!({
            "Results": {
                "predicted_pollen_count": {
                    "type": "table",
                    "value": {
                        "ColumnNames": ["pollen_type", "predicted_pollen_count"],
                        "ColumnTypes": ["String", "Double"],
                        "Values": [["grass", "14.25"], ["birch", "0.5"]]
                    }
                }
            }
        })),
    )
}

async fn historical(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::FORBIDDEN, Json(json!({})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "Results": {
                "historical_pollen_count": {
                    "type": "table",
                    "value": {
                        "ColumnNames": ["date", "pollen_count", "predicted_pollen_count"],
                        "ColumnTypes": ["DateTime", "Int32", "Double"],
                        "Values": [
                            ["5/17/2019 12:00:00 AM", "22", "18.5"],
                            ["5/18/2019 12:00:00 AM", "--", "19.0"],
                            ["5/19/2019 12:00:00 AM", "9", "11.5"]
                        ]
                    }
                }
            }
        })),
    )
}

async fn feed() -> impl IntoResponse {
    (
        [("content-type", "application/rss+xml")],
        rss_document(&[
            ("Viborg", "grass: 3; birch: 1"),
            ("Copenhagen", "grass:12;birch:-"),
        ]),
    )
}

async fn chart(headers: HeaderMap, Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
    if headers.get("origin").is_none() || headers.get("referer").is_none() {
        return (StatusCode::FORBIDDEN, String::new());
    }
    let today = time::today();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap();
    let count = match form.get("type_id").map(String::as_str) {
        Some("28") => 31,
        Some("7") => 4,
        _ => return (StatusCode::BAD_REQUEST, String::new()),
    };
    assert_eq!(form.get("station_id").map(String::as_str), Some("48"));
    (StatusCode::OK, chart_page(&[(yesterday, count - 1), (today, count)]))
}

/// Anti-bot wall in front of the report portal
async fn chart_blocked() -> impl IntoResponse {
    (StatusCode::FORBIDDEN, "Access denied")
}

async fn upstream_config() -> PollenConfig {
    let base = spawn_upstream(
        Router::new()
            .route("/predict", post(predictions))
            .route("/historical", post(historical))
            .route("/rss", get(feed))
            .route("/chart", post(chart))
            .route("/chart-blocked", post(chart_blocked)),
    )
    .await;

    let mut config = PollenConfig::default();
    config.http.request_timeout_secs = 5;
    config.prediction.endpoint = format!("{}/predict", base);
    config.prediction.api_key = Some(API_KEY.to_string());
    config.prediction.historical_endpoint = format!("{}/historical", base);
    config.prediction.historical_api_key = Some(API_KEY.to_string());
    config.scrape.url = format!("{}/chart", base);
    config.feed.url = format!("{}/rss", base);
    config.feed.pollen_keys = BTreeMap::from([
        (PollenType::Grass, "grass".to_string()),
        (PollenType::Birch, "birch".to_string()),
    ]);
    config.feed.locations = vec![FeedLocation {
        location_id: 0,
        title: "copenhagen".to_string(),
    }];
    config
}

#[tokio::test]
async fn test_feed_counts_are_merged_as_count_only() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let mut config = upstream_config().await;
    config.daily.count_source = CountSource::Feed;
    let today = time::today();

    let report = build_orchestrator(pool.clone(), config)
        .unwrap()
        .run_daily_at(today)
        .await;

    assert_eq!(report.status(), RunStatus::Success);
    let rows = fetch_all_rows(&pool).await.unwrap();
    assert!(rows.contains(&(today, PollenType::Grass.id(), 0, Some(12), None)));
    assert!(rows.contains(&(today, PollenType::Birch.id(), 0, Some(0), None)));
}

#[tokio::test]
async fn test_feed_client_reads_single_count() {
    let config = upstream_config().await;
    let client = FeedClient::new(&config.feed, &config.http).unwrap();

    assert_eq!(client.fetch_count("COPENHAGEN", "grass").await.unwrap(), 12);
    assert_eq!(client.fetch_count("viborg", "birch").await.unwrap(), 1);
    assert!(matches!(
        client.fetch_count("Aarhus", "grass").await,
        Err(IngestError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_daily_run_merges_predictions_and_scraped_counts() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let config = upstream_config().await;
    let today = time::today();
    let tomorrow = time::next_day(today);

    let report = build_orchestrator(pool.clone(), config)
        .unwrap()
        .run_daily_at(today)
        .await;

    assert_eq!(report.status(), RunStatus::Success);
    let rows = fetch_all_rows(&pool).await.unwrap();
    assert_eq!(
        rows,
        vec![
            (today, PollenType::Grass.id(), 0, Some(31), None),
            (today, PollenType::Birch.id(), 0, Some(4), None),
            (tomorrow, PollenType::Grass.id(), 0, None, Some(14.25)),
            (tomorrow, PollenType::Birch.id(), 0, None, Some(0.5)),
        ]
    );
}

#[tokio::test]
async fn test_rejected_key_is_unauthorized_and_fatal() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let mut config = upstream_config().await;
    config.prediction.api_key = Some("wrong-key".to_string());

    let report = build_orchestrator(pool, config)
        .unwrap()
        .run_daily_at(time::today())
        .await;

    let prediction = report.branch(Branch::Prediction).unwrap();
    assert!(matches!(prediction.failures[0].error, IngestError::Unauthorized(_)));
    assert_eq!(report.status(), RunStatus::Fatal);
}

#[tokio::test]
async fn test_full_history_skips_malformed_rows() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let config = upstream_config().await;

    let report = build_orchestrator(pool.clone(), config)
        .unwrap()
        .run_full_history()
        .await;

    let branch = report.branch(Branch::FullHistory).unwrap();
    assert_eq!(branch.written, 2);
    assert_eq!(branch.skipped, 1);
    assert_eq!(report.status(), RunStatus::Success);

    let rows = fetch_all_rows(&pool).await.unwrap();
    assert_eq!(
        rows,
        vec![
            (helpers::day(2019, 5, 17), PollenType::Grass.id(), 0, Some(22), Some(18.5)),
            (helpers::day(2019, 5, 19), PollenType::Grass.id(), 0, Some(9), Some(11.5)),
        ]
    );
}

#[tokio::test]
async fn test_unreachable_upstream_is_fetch_error() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let mut config = upstream_config().await;
    config.feed.url = "http://127.0.0.1:9/rss".to_string();
    config.daily.count_source = CountSource::Feed;

    let report = build_orchestrator(pool, config)
        .unwrap()
        .run_daily_at(time::today())
        .await;

    let count = report.branch(Branch::Count).unwrap();
    assert_eq!(count.written, 0);
    assert!(count
        .failures
        .iter()
        .all(|f| matches!(f.error, IngestError::Fetch(_))));
    assert_eq!(report.branch(Branch::Prediction).unwrap().written, 2);
    assert_eq!(report.status(), RunStatus::PartialFailure);
}

#[tokio::test]
async fn test_forbidden_portal_is_partial_failure() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let mut config = upstream_config().await;
    config.scrape.url = format!("{}-blocked", config.scrape.url);
    let today = time::today();

    let report = build_orchestrator(pool.clone(), config)
        .unwrap()
        .run_daily_at(today)
        .await;

    let count = report.branch(Branch::Count).unwrap();
    assert_eq!(count.written, 0);
    assert!(!count.failures.is_empty());
    assert!(count
        .failures
        .iter()
        .all(|f| matches!(f.error, IngestError::Fetch(_))));

    let prediction = report.branch(Branch::Prediction).unwrap();
    assert!(!prediction.cancelled);
    assert_eq!(prediction.written, 2);
    assert_eq!(report.status(), RunStatus::PartialFailure);

    let rows = fetch_all_rows(&pool).await.unwrap();
    let tomorrow = time::next_day(today);
    assert_eq!(
        rows,
        vec![
            (tomorrow, PollenType::Grass.id(), 0, None, Some(14.25)),
            (tomorrow, PollenType::Birch.id(), 0, None, Some(0.5)),
        ]
    );
}
