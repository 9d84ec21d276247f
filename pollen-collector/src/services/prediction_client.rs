//! Remote prediction service adapter
//!
//! Two endpoints of a hosted ML service, each with its own key:
//!
//! - daily: tomorrow's predicted count per pollen type
//! - historical: the full dataset of observed and predicted counts per day,
//!   used once for backfill
//!
//! Both answer with a tabular envelope:
//! `Results.<output>.value.{ColumnNames, ColumnTypes, Values}`.

use async_trait::async_trait;
use chrono::NaiveDate;
use pollen_common::config::{HttpConfig, PredictionConfig};
use pollen_common::PollenType;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{IngestError, IngestResult};
use crate::services::http::{build_client, check_status, transport_error};
use crate::types::{HistoricalBatch, HistoricalPredictionRow, PollenPrediction, PredictionSource};

const SOURCE: &str = "Prediction service";
const HISTORICAL_SOURCE: &str = "Historical prediction service";

/// Date part of the historical timestamp column (`M/D/YYYY h:mm:ss AM`)
const HISTORICAL_DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Deserialize)]
struct PredictionEnvelope {
    #[serde(rename = "Results")]
    results: PredictionResults,
}

#[derive(Debug, Deserialize)]
struct PredictionResults {
    predicted_pollen_count: ResultTable,
}

#[derive(Debug, Deserialize)]
struct HistoricalEnvelope {
    #[serde(rename = "Results")]
    results: HistoricalResults,
}

#[derive(Debug, Deserialize)]
struct HistoricalResults {
    historical_pollen_count: ResultTable,
}

#[derive(Debug, Deserialize)]
struct ResultTable {
    value: TableValue,
}

/// Tabular payload; cells are usually strings but may be JSON numbers
#[derive(Debug, Deserialize)]
struct TableValue {
    #[serde(rename = "ColumnNames", default)]
    column_names: Vec<String>,
    #[serde(rename = "ColumnTypes", default)]
    column_types: Vec<String>,
    #[serde(rename = "Values", default)]
    values: Vec<Vec<Value>>,
}

/// Client for the prediction service
pub struct PredictionClient {
    http_client: Client,
    config: PredictionConfig,
}

impl PredictionClient {
    /// `config` is expected to carry already-resolved API keys
    pub fn new(config: PredictionConfig, http: &HttpConfig) -> IngestResult<Self> {
        Ok(Self {
            http_client: build_client(http)?,
            config,
        })
    }

    async fn post_json<T>(
        &self,
        source: &str,
        endpoint: &str,
        api_key: Option<&str>,
        body: Value,
    ) -> IngestResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if endpoint.trim().is_empty() {
            return Err(IngestError::Config(format!("{} endpoint is not configured", source)));
        }
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| IngestError::Config(format!("{} API key is not configured", source)))?;

        debug!(endpoint = %endpoint, "Querying {}", source);

        let response = self
            .http_client
            .post(endpoint)
            .bearer_auth(api_key)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(source, e))?;
        let response = check_status(source, response, true).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| IngestError::Parse(format!("{} response: {}", source, e)))
    }
}

#[async_trait]
impl PredictionSource for PredictionClient {
    async fn fetch_tomorrow(&self) -> IngestResult<Vec<PollenPrediction>> {
        let envelope: PredictionEnvelope = self
            .post_json(
                SOURCE,
                &self.config.endpoint,
                self.config.api_key.as_deref(),
                json!({ "GlobalParameters": { "Output_name": "" } }),
            )
            .await?;

        let table = envelope.results.predicted_pollen_count.value;
        debug!(
            columns = ?table.column_names,
            types = ?table.column_types,
            rows = table.values.len(),
            "Received prediction table"
        );
        parse_prediction_rows(&table.values)
    }

    async fn fetch_historical(&self) -> IngestResult<HistoricalBatch> {
        let envelope: HistoricalEnvelope = self
            .post_json(
                HISTORICAL_SOURCE,
                &self.config.historical_endpoint,
                self.config.historical_api_key.as_deref(),
                json!({ "GlobalParameters": {} }),
            )
            .await?;

        let table = envelope.results.historical_pollen_count.value;
        debug!(
            columns = ?table.column_names,
            rows = table.values.len(),
            "Received historical prediction table"
        );
        Ok(parse_historical_rows(&table.values))
    }
}

/// Cell as text: strings as-is, numbers rendered
fn cell_text(row: &[Value], column: usize) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decimal count; NaN and infinities are rejected, the store cannot hold them
fn parse_finite_count(raw: &str) -> Result<f32, String> {
    let value: f32 = raw.parse().map_err(|e| format!("'{}': {}", raw, e))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("'{}' is not a finite number", raw))
    }
}

/// One prediction per row; any bad row fails the whole batch
pub fn parse_prediction_rows(rows: &[Vec<Value>]) -> IngestResult<Vec<PollenPrediction>> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let type_name = cell_text(row, 0).ok_or_else(|| {
                IngestError::Parse(format!("Prediction row {} has no pollen type", index))
            })?;
            let pollen_type: PollenType = type_name
                .parse()
                .map_err(|_| IngestError::UnknownPollenType(type_name.clone()))?;

            let raw = cell_text(row, 1).ok_or_else(|| {
                IngestError::Parse(format!("Prediction row {} has no predicted count", index))
            })?;
            let predicted_count = parse_finite_count(&raw).map_err(|reason| {
                IngestError::Parse(format!("Predicted count in row {}: {}", index, reason))
            })?;

            Ok(PollenPrediction {
                pollen_type,
                predicted_count,
            })
        })
        .collect()
}

fn parse_historical_row(row: &[Value]) -> Result<HistoricalPredictionRow, String> {
    let timestamp = cell_text(row, 0).ok_or("missing date")?;
    let date_part = timestamp.split_whitespace().next().unwrap_or_default();
    let date = NaiveDate::parse_from_str(date_part, HISTORICAL_DATE_FORMAT)
        .map_err(|e| format!("date '{}': {}", timestamp, e))?;

    let observed = cell_text(row, 1).ok_or("missing count")?;
    let observed_count: i32 = observed
        .parse()
        .map_err(|e| format!("count '{}': {}", observed, e))?;

    let predicted = cell_text(row, 2).ok_or("missing predicted count")?;
    let predicted_count =
        parse_finite_count(&predicted).map_err(|reason| format!("predicted count {}", reason))?;

    Ok(HistoricalPredictionRow {
        date,
        observed_count,
        predicted_count,
    })
}

/// Parse every row, skipping (and counting) malformed ones
pub fn parse_historical_rows(rows: &[Vec<Value>]) -> HistoricalBatch {
    let mut batch = HistoricalBatch::default();

    for (index, row) in rows.iter().enumerate() {
        match parse_historical_row(row) {
            Ok(parsed) => batch.rows.push(parsed),
            Err(reason) => {
                warn!(row = index, reason = %reason, "Skipping malformed historical row");
                batch.skipped += 1;
            }
        }
    }

    batch
}
