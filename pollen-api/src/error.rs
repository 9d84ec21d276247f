//! API error type and its JSON rendering
//!
//! Every failure is answered with `{"error": {"code": ..., "message": ...}}`.
//! Store failures are logged and reported as a generic 500 so internal
//! details never reach clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The lookup succeeded but matched nothing
    #[error("Object not found")]
    NotFound,

    /// Malformed path segment or query parameter
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] pollen_common::Error),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Store(pollen_common::Error::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            ApiError::Store(pollen_common::Error::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
