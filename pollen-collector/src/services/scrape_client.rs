//! Historical chart scrape adapter
//!
//! The report portal renders a yearly chart per station and pollen type. The
//! page is requested with a form POST and browser-like headers; the portal
//! rejects requests that do not look like they come from its own page.

use async_trait::async_trait;
use pollen_common::config::{HttpConfig, ScrapeConfig};
use reqwest::header::{ORIGIN, REFERER};
use reqwest::Client;
use tracing::debug;

use crate::error::IngestResult;
use crate::extractors::extract_series;
use crate::services::http::{build_client, check_status, transport_error};
use crate::types::{HistoricalPollenCount, ScrapeSource};

const SOURCE: &str = "Pollen chart portal";

/// Client for the pollen chart portal
pub struct ScrapeClient {
    http_client: Client,
    url: String,
    origin: String,
    referer: String,
}

impl ScrapeClient {
    pub fn new(scrape: &ScrapeConfig, http: &HttpConfig) -> IngestResult<Self> {
        Ok(Self {
            http_client: build_client(http)?,
            url: scrape.url.clone(),
            origin: scrape.origin.clone(),
            referer: scrape.referer.clone(),
        })
    }

    /// Fetch the raw report page
    pub async fn fetch_page(&self, station_id: u32, type_id: u32) -> IngestResult<String> {
        debug!(station_id, type_id, "Fetching pollen chart page");

        let form = [
            ("station_id", station_id.to_string()),
            ("type_id", type_id.to_string()),
        ];

        let response = self
            .http_client
            .post(&self.url)
            .header(ORIGIN, &self.origin)
            .header(REFERER, &self.referer)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(SOURCE, e))?;
        let response = check_status(SOURCE, response, false).await?;

        response.text().await.map_err(|e| transport_error(SOURCE, e))
    }
}

#[async_trait]
impl ScrapeSource for ScrapeClient {
    async fn fetch_series(&self, station_id: u32, type_id: u32) -> IngestResult<Vec<HistoricalPollenCount>> {
        let page = self.fetch_page(station_id, type_id).await?;
        let series = extract_series(&page)?;

        debug!(station_id, type_id, points = series.len(), "Recovered chart series");
        Ok(series)
    }
}
