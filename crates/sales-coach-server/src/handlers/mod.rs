pub mod chat;
pub mod health;
pub mod results;
pub mod session;
pub mod workflows;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::utils::error::ApiError;

/// Lenient JSON body: an empty body is the default value, anything that is
/// not valid JSON of the expected shape is a 400.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// A present, non-blank string field.
pub(crate) fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required field: {}", name)))
}
