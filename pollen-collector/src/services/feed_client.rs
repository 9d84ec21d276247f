//! Syndication feed adapter
//!
//! The feed carries one item per city. Its description is a loose
//! `key: value; key: value` list, e.g. `Græs: 12; Birk: -`, where `-` means
//! nothing was measured.

use async_trait::async_trait;
use pollen_common::config::{FeedConfig, HttpConfig};
use reqwest::Client;
use rss::Channel;
use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::services::http::{build_client, check_status, transport_error};
use crate::types::FeedSource;

const SOURCE: &str = "Pollen feed";

/// Value the feed uses for "no count"
const EMPTY_COUNT: &str = "-";

/// Client for the pollen RSS feed
pub struct FeedClient {
    http_client: Client,
    url: String,
}

impl FeedClient {
    pub fn new(feed: &FeedConfig, http: &HttpConfig) -> IngestResult<Self> {
        Ok(Self {
            http_client: build_client(http)?,
            url: feed.url.clone(),
        })
    }

    /// Fetch and parse the whole feed document
    pub async fn fetch_channel(&self) -> IngestResult<Channel> {
        debug!(url = %self.url, "Fetching pollen feed");

        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| transport_error(SOURCE, e))?;
        let response = check_status(SOURCE, response, false).await?;
        let bytes = response.bytes().await.map_err(|e| transport_error(SOURCE, e))?;

        Channel::read_from(&bytes[..])
            .map_err(|e| IngestError::Parse(format!("Malformed feed document: {}", e)))
    }

    /// Today's count for `key` in the item titled `location_title`
    pub async fn fetch_count(&self, location_title: &str, key: &str) -> IngestResult<i32> {
        self.fetch_snapshot().await?.count(location_title, key)
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch_snapshot(&self) -> IngestResult<FeedSnapshot> {
        let channel = self.fetch_channel().await?;
        Ok(FeedSnapshot::from_channel(&channel))
    }
}

/// Titles and descriptions of one feed document
///
/// Fetched once per run and queried for every (location, pollen type) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    items: Vec<(String, String)>,
}

impl FeedSnapshot {
    pub fn from_channel(channel: &Channel) -> Self {
        Self::from_items(channel.items().iter().filter_map(|item| {
            let title = item.title()?;
            Some((title, item.description().unwrap_or_default()))
        }))
    }

    pub fn from_items<'a>(items: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|(title, description)| (title.to_string(), description.to_string()))
                .collect(),
        }
    }

    /// Find the count for `key` in the item titled `location_title`
    ///
    /// Title match is case-insensitive. The description is lower-cased and
    /// stripped of spaces and line breaks before it is split into fields.
    pub fn count(&self, location_title: &str, key: &str) -> IngestResult<i32> {
        let wanted_title = location_title.trim().to_lowercase();
        let wanted_key = key.trim().to_lowercase();

        let (_, description) = self
            .items
            .iter()
            .find(|(title, _)| title.trim().to_lowercase() == wanted_title)
            .ok_or_else(|| IngestError::NotFound(format!("No feed item titled '{}'", location_title)))?;

        let value = description_fields(description)
            .into_iter()
            .find(|(field_key, _)| *field_key == wanted_key)
            .map(|(_, value)| value)
            .ok_or_else(|| {
                IngestError::NotFound(format!(
                    "No '{}' value in feed item '{}'",
                    key, location_title
                ))
            })?;

        parse_count(&value)
    }
}

/// Split a description into `(key, value)` pairs
///
/// Fields without a `:` are ignored.
fn description_fields(description: &str) -> Vec<(String, String)> {
    let cleaned: String = description
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\n' | '\r'))
        .collect();

    cleaned
        .split(';')
        .filter_map(|field| {
            let (key, value) = field.split_once(':')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_count(value: &str) -> IngestResult<i32> {
    if value == EMPTY_COUNT {
        return Ok(0);
    }
    value
        .parse::<i32>()
        .map_err(|e| IngestError::Parse(format!("Feed count '{}' is not an integer: {}", value, e)))
}
