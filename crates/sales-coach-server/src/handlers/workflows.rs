use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::services::workflow::WorkflowRecord;
use crate::services::WorkflowRunner;
use crate::utils::error::ApiError;

pub async fn workflow_status_handler(
    State(runner): State<Arc<WorkflowRunner>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    Uuid::parse_str(&workflow_id)
        .ok()
        .and_then(|id| runner.status(&id))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown workflow: {}", workflow_id)))
}
