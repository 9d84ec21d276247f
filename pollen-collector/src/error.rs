//! Ingestion error taxonomy
//!
//! Adapter errors are never retried. The orchestrator logs them with pair or
//! branch context and ends that unit of work; only the fatal configuration
//! errors ([`IngestError::is_fatal`]) reach across branches.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while fetching, parsing or merging upstream data
#[derive(Debug, Error)]
pub enum IngestError {
    /// Transport failure or non-success HTTP status
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Malformed number, row or document
    #[error("Parse error: {0}")]
    Parse(String),

    /// The upstream document does not contain the requested value
    #[error("Not found: {0}")]
    NotFound(String),

    /// The embedded chart script could not be recovered
    #[error("Scrape format error: {0}")]
    ScrapeFormat(String),

    /// A prediction row names a pollen type the store does not know
    #[error("Unknown pollen type: {0}")]
    UnknownPollenType(String),

    /// The latest scraped point is too old to be today's count
    #[error("Latest point {latest} is more than {max_staleness_hours}h before {today}")]
    SanityCheck {
        latest: NaiveDate,
        today: NaiveDate,
        max_staleness_hours: i64,
    },

    /// Store write or lookup failed
    #[error("Store error: {0}")]
    Store(#[from] pollen_common::Error),

    /// Upstream rejected the credentials (401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Required configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// Fatal errors cancel the sibling branch; everything else stays local
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Unauthorized(_) | IngestError::Config(_))
    }
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_errors_are_fatal() {
        assert!(IngestError::Unauthorized("401".into()).is_fatal());
        assert!(IngestError::Config("no key".into()).is_fatal());
        assert!(!IngestError::Fetch("timeout".into()).is_fatal());
        assert!(!IngestError::ScrapeFormat("no marker".into()).is_fatal());
        assert!(!IngestError::Store(pollen_common::Error::UnknownLocation(3)).is_fatal());
    }

    #[test]
    fn test_sanity_check_message_names_both_dates() {
        let err = IngestError::SanityCheck {
            latest: NaiveDate::from_ymd_opt(2020, 5, 1).unwrap(),
            today: NaiveDate::from_ymd_opt(2020, 5, 4).unwrap(),
            max_staleness_hours: 24,
        };
        assert_eq!(err.to_string(), "Latest point 2020-05-01 is more than 24h before 2020-05-04");
    }
}
