use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::session::StoreError;

/// Errors surfaced by the public HTTP surface. Bodies are plaintext.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::BadRequest(msg) => tracing::warn!("Bad request: {}", msg),
            ApiError::NotFound(msg) => tracing::warn!("Not found: {}", msg),
            ApiError::ServiceUnavailable(msg) => tracing::warn!("Service unavailable: {}", msg),
            ApiError::Storage(e) => tracing::error!("Storage error: {}", e),
        }

        (status, self.to_string()).into_response()
    }
}
