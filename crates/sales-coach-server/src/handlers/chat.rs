use axum::{body::Bytes, extract::State, Json};
use std::sync::Arc;
use tracing::info;

use super::{parse_body, required};
use crate::models::chat::{ChatRequest, ChatResponse};
use crate::services::ChatService;
use crate::utils::error::ApiError;

pub async fn chat_handler(
    State(chat_service): State<Arc<ChatService>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let request: ChatRequest = parse_body(&body)?;

    let session_id = required(request.session_id, "sessionId")?;
    let message = required(request.message, "message")?;

    info!(
        "Chat request: session={}, message_len={}",
        session_id,
        message.len()
    );

    let response = chat_service.handle_message(&session_id, &message).await;
    Ok(Json(response))
}
