use axum::{
    http::{StatusCode, Uri},
    Json,
};
use serde::Serialize;

pub const USAGE: &str = "Sales coach API\n\
\n\
POST /api/chat        {\"sessionId\", \"message\"}  -> reply, followUps, dealMemory, rollingSummary, userTurnCount\n\
GET  /api/results?sessionId=...                   -> full session state (includes final when ready)\n\
POST /api/end-call    {\"sessionId\"}              -> starts finalization, returns workflowId\n\
GET  /api/workflows/{workflowId}                  -> finalization status\n\
POST /api/reset       {\"sessionId\"}              -> clears the session\n";

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

pub async fn index() -> &'static str {
    USAGE
}

pub async fn not_found(uri: Uri) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Not found: {}", uri.path()))
}
