use axum::{body::Bytes, extract::State, Json};
use std::sync::Arc;
use tracing::info;

use super::{parse_body, required};
use crate::models::chat::{EndCallResponse, ResetResponse, SessionRequest};
use crate::services::{SessionStore, WorkflowRunner};
use crate::utils::error::ApiError;

/// Queue finalization of the session's current conversation and return
/// immediately with the workflow id.
pub async fn end_call_handler(
    State(store): State<Arc<SessionStore>>,
    State(runner): State<Arc<WorkflowRunner>>,
    body: Bytes,
) -> Result<Json<EndCallResponse>, ApiError> {
    let request: SessionRequest = parse_body(&body)?;
    let session_id = required(request.session_id, "sessionId")?;

    let conversation_id = store.get_state(&session_id).await?.conversation_id;
    let workflow_id = runner
        .trigger(&session_id, conversation_id)
        .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;

    info!("End call: session={}, workflow={}", session_id, workflow_id);

    Ok(Json(EndCallResponse {
        ok: true,
        workflow_id: workflow_id.to_string(),
    }))
}

pub async fn reset_handler(
    State(store): State<Arc<SessionStore>>,
    body: Bytes,
) -> Result<Json<ResetResponse>, ApiError> {
    let request: SessionRequest = parse_body(&body)?;
    let session_id = required(request.session_id, "sessionId")?;

    store.reset(&session_id).await?;

    Ok(Json(ResetResponse {
        ok: true,
        message: format!("Session {} reset", session_id),
    }))
}
