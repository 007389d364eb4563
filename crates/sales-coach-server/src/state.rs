use axum::extract::FromRef;
use std::sync::Arc;

use crate::services::{ChatService, SessionStore, WorkflowRunner};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub chat_service: Arc<ChatService>,
    pub workflow_runner: Arc<WorkflowRunner>,
}

impl FromRef<AppState> for Arc<SessionStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<ChatService> {
    fn from_ref(state: &AppState) -> Self {
        state.chat_service.clone()
    }
}

impl FromRef<AppState> for Arc<WorkflowRunner> {
    fn from_ref(state: &AppState) -> Self {
        state.workflow_runner.clone()
    }
}
