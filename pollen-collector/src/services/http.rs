//! Shared outbound HTTP plumbing for the upstream adapters

use pollen_common::config::HttpConfig;
use reqwest::{Client, Response, StatusCode};

use crate::error::{IngestError, IngestResult};

/// Longest slice of an error body carried into a `Fetch` error
const BODY_EXCERPT_CHARS: usize = 200;

/// Build a client with the configured user agent and per-request timeout
pub fn build_client(config: &HttpConfig) -> IngestResult<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| IngestError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Map a transport error, keeping timeouts recognizable in logs
pub fn transport_error(source: &str, err: reqwest::Error) -> IngestError {
    if err.is_timeout() {
        IngestError::Fetch(format!("{}: request timed out", source))
    } else {
        IngestError::Fetch(format!("{}: {}", source, err))
    }
}

/// Pass successful responses through; turn everything else into an error
///
/// For a `credentialed` request 401/403 mean the key was rejected and come
/// back as `Unauthorized`. Anonymous sources answering 401/403 are treated
/// like any other upstream failure.
pub async fn check_status(source: &str, response: Response, credentialed: bool) -> IngestResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if credentialed && is_auth_rejection(status) {
        return Err(IngestError::Unauthorized(format!(
            "{} rejected credentials ({})",
            source,
            status.as_u16()
        )));
    }

    let body = response.text().await.unwrap_or_default();
    Err(IngestError::Fetch(format!(
        "{} returned HTTP {}: {}",
        source,
        status.as_u16(),
        excerpt(&body)
    )))
}

fn is_auth_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
        format!("{}...", cut)
    }
}
