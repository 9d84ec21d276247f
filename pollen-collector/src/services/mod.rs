//! Upstream source adapters
//!
//! Each adapter fetches raw bytes, parses them into a small typed result and
//! fails explicitly when the shape is unexpected. None of them retries.

pub mod feed_client;
pub mod http;
pub mod prediction_client;
pub mod scrape_client;

pub use feed_client::{FeedClient, FeedSnapshot};
pub use prediction_client::PredictionClient;
pub use scrape_client::ScrapeClient;
