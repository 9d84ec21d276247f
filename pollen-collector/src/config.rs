//! API key resolution for the prediction service
//!
//! **Priority:** ENV → TOML
//!
//! Keys are resolved once at startup and folded into the immutable
//! [`PredictionConfig`] handed to the prediction client. A key that is still
//! missing is not an error here; the client reports it as a fatal
//! configuration error when the endpoint is actually called.

use pollen_common::config::PredictionConfig;
use tracing::{info, warn};

/// Environment override for the daily prediction endpoint key
pub const PREDICTION_KEY_ENV: &str = "POLLEN_PREDICTION_API_KEY";

/// Environment override for the historical backfill endpoint key
pub const HISTORICAL_KEY_ENV: &str = "POLLEN_HISTORICAL_API_KEY";

/// Resolve one API key from environment and TOML
pub fn resolve_api_key(label: &str, env_var: &str, toml_key: Option<&str>) -> Option<String> {
    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_key.filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} API key found in both environment and TOML. Using environment (highest priority).",
            label
        );
    }

    if let Some(key) = env_key {
        info!("{} API key loaded from environment variable {}", label, env_var);
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!("{} API key loaded from TOML config", label);
        return Some(key.to_string());
    }

    warn!("{} API key not configured (set {} or [prediction] in TOML)", label, env_var);
    None
}

/// Fold environment overrides into the prediction section
pub fn resolve_prediction_keys(mut config: PredictionConfig) -> PredictionConfig {
    config.api_key = resolve_api_key("Prediction", PREDICTION_KEY_ENV, config.api_key.as_deref());
    config.historical_api_key = resolve_api_key(
        "Historical prediction",
        HISTORICAL_KEY_ENV,
        config.historical_api_key.as_deref(),
    );
    config
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
