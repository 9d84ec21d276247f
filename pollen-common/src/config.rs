//! Configuration loading
//!
//! Both binaries read the same TOML file. Every section has built-in defaults,
//! so a missing file or a missing section degrades to defaults with a warning
//! instead of aborting startup.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--config`, `--database`)
//! 2. Environment variables (`POLLEN_CONFIG`, `POLLEN_DATABASE`, API key overrides)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! The loaded value is immutable and passed explicitly to the components that
//! need it; nothing here is process-global.

use crate::{Error, PollenType, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Default configuration file name, resolved against the working directory
pub const DEFAULT_CONFIG_FILE: &str = "pollen.toml";

const DEFAULT_FEED_URL: &str = "http://www.dmi.dk/vejr/services/pollen-rss/";
const DEFAULT_SCRAPE_URL: &str = "https://www.astma-allergi.dk/pollengrafer?p_p_id=graph_WAR_pollenportlet_INSTANCE_mt98szMFusmP&p_p_lifecycle=0&p_p_state=normal&p_p_mode=view&p_p_col_id=column-2&p_p_col_pos=2&p_p_col_count=4&_graph_WAR_pollenportlet_INSTANCE_mt98szMFusmP_action=graph";
const DEFAULT_SCRAPE_ORIGIN: &str = "https://www.astma-allergi.dk";
const DEFAULT_SCRAPE_REFERER: &str = "https://www.astma-allergi.dk/pollengrafer";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/66.0.3359.181 Safari/537.36";

/// Root configuration document
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollenConfig {
    /// Path to the SQLite database file (relative or absolute)
    pub database_path: PathBuf,
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub feed: FeedConfig,
    pub scrape: ScrapeConfig,
    pub prediction: PredictionConfig,
    pub daily: DailyConfig,
    pub api: ApiConfig,
}

impl Default for PollenConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("pollen.db"),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
            feed: FeedConfig::default(),
            scrape: ScrapeConfig::default(),
            prediction: PredictionConfig::default(),
            daily: DailyConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Outbound HTTP settings shared by every upstream adapter
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Upper bound for a single upstream request, connect to last byte
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// Maps a store location to the title of its item in the syndication feed
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedLocation {
    pub location_id: i64,
    pub title: String,
}

/// Syndication feed source
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    /// Key used for each pollen type inside the item description
    #[serde(deserialize_with = "pollen_type_map")]
    pub pollen_keys: BTreeMap<PollenType, String>,
    pub locations: Vec<FeedLocation>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            pollen_keys: BTreeMap::from([
                (PollenType::Grass, "græs".to_string()),
                (PollenType::Birch, "birk".to_string()),
            ]),
            locations: vec![FeedLocation {
                location_id: 0,
                title: "københavn".to_string(),
            }],
        }
    }
}

impl FeedConfig {
    pub fn title_for(&self, location_id: i64) -> Option<&str> {
        self.locations
            .iter()
            .find(|l| l.location_id == location_id)
            .map(|l| l.title.as_str())
    }
}

/// Maps a store location to the upstream scrape station code
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationMapping {
    pub location_id: i64,
    pub station_id: u32,
}

/// Historical chart scrape source
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub url: String,
    pub origin: String,
    pub referer: String,
    /// Upstream type code for each pollen type
    #[serde(deserialize_with = "pollen_type_map")]
    pub pollen_type_ids: BTreeMap<PollenType, u32>,
    pub stations: Vec<StationMapping>,
    /// Latest scraped point may lag today by at most this many hours
    pub max_staleness_hours: i64,
    /// Extra days before today re-merged at their own dates (0 = today only)
    pub catch_up_days: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SCRAPE_URL.to_string(),
            origin: DEFAULT_SCRAPE_ORIGIN.to_string(),
            referer: DEFAULT_SCRAPE_REFERER.to_string(),
            pollen_type_ids: BTreeMap::from([(PollenType::Grass, 28), (PollenType::Birch, 7)]),
            stations: vec![StationMapping {
                location_id: 0,
                station_id: 48,
            }],
            max_staleness_hours: 24,
            catch_up_days: 0,
        }
    }
}

impl ScrapeConfig {
    pub fn station_for(&self, location_id: i64) -> Option<u32> {
        self.stations
            .iter()
            .find(|s| s.location_id == location_id)
            .map(|s| s.station_id)
    }

    pub fn type_id_for(&self, pollen_type: PollenType) -> Option<u32> {
        self.pollen_type_ids.get(&pollen_type).copied()
    }
}

/// Remote prediction service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub historical_endpoint: String,
    pub historical_api_key: Option<String>,
    /// Location attached to predictions (the service predicts a single location)
    pub default_location_id: i64,
    /// Pollen type attached to historical backfill rows
    pub historical_pollen_type: PollenType,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            historical_endpoint: String::new(),
            historical_api_key: None,
            default_location_id: 0,
            historical_pollen_type: PollenType::Grass,
        }
    }
}

/// Where the daily observed count comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountSource {
    /// Latest point of the scraped historical chart
    #[default]
    Scrape,
    /// Today's value from the syndication feed
    Feed,
}

impl FromStr for CountSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "scrape" => Ok(CountSource::Scrape),
            "feed" => Ok(CountSource::Feed),
            other => Err(Error::Config(format!(
                "Invalid count source '{}' (expected 'scrape' or 'feed')",
                other
            ))),
        }
    }
}

/// Daily run settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DailyConfig {
    pub count_source: CountSource,
}

/// Read API server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8001".to_string(),
        }
    }
}

/// Deserialize a TOML table keyed by pollen type name (`grass = ...`)
fn pollen_type_map<'de, D, V>(deserializer: D) -> std::result::Result<BTreeMap<PollenType, V>, D::Error>
where
    D: serde::Deserializer<'de>,
    V: Deserialize<'de>,
{
    let raw = BTreeMap::<String, V>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            key.parse::<PollenType>()
                .map(|t| (t, value))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

impl PollenConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from a TOML file
    ///
    /// A missing file is not an error: a warning is logged and defaults are used.
    /// An unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;

        info!("Loaded TOML configuration from {}", path.display());
        Ok(config)
    }
}

/// Resolve the configuration file path
///
/// CLI argument (clap already folds in `POLLEN_CONFIG`) wins; otherwise
/// `pollen.toml` in the working directory.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    cli_arg
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
