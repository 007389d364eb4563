use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use super::required;
use crate::models::chat::ResultsQuery;
use crate::models::AgentState;
use crate::services::SessionStore;
use crate::utils::error::ApiError;

pub async fn results_handler(
    State(store): State<Arc<SessionStore>>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<AgentState>, ApiError> {
    let session_id = required(query.session_id, "sessionId")?;
    let state = store.get_state(&session_id).await?;
    Ok(Json(state))
}
