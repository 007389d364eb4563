use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{StateBackend, StoreError};
use crate::models::{AgentState, FinalResult, Message};

/// Session state service with one writer at a time per session id.
///
/// Every read-modify-write goes through a [`SessionHandle`], which holds the
/// session's lock until it is dropped. Sessions never contend with each other.
pub struct SessionStore {
    backend: Arc<dyn StateBackend>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self {
            backend,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Lock the session and load its state for modification.
    pub async fn open(&self, session_id: &str) -> Result<SessionHandle, StoreError> {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;

        // Built before loading so a failed load still prunes the lock on drop
        let mut handle = SessionHandle {
            session_id: session_id.to_string(),
            state: AgentState::default(),
            backend: self.backend.clone(),
            locks: self.locks.clone(),
            guard: Some(guard),
        };

        if let Some(record) = self.backend.load(session_id).await? {
            handle.state = AgentState::from_persisted(&record);
        }

        Ok(handle)
    }

    /// Current state. Unknown sessions read as the default state and are not created.
    pub async fn get_state(&self, session_id: &str) -> Result<AgentState, StoreError> {
        Ok(self.open(session_id).await?.into_state())
    }

    /// Write `final` for the conversation identified by `conversation_id`
    /// (as read before finalization started). Returns `false` without writing
    /// when the session was reset or restarted in the meantime.
    pub async fn set_final(
        &self,
        session_id: &str,
        conversation_id: Option<Uuid>,
        result: FinalResult,
    ) -> Result<bool, StoreError> {
        let mut handle = self.open(session_id).await?;
        if handle.state.conversation_id != conversation_id {
            warn!(
                "Session {} changed conversation during finalization, result discarded",
                session_id
            );
            return Ok(false);
        }

        handle.set_final(result);
        handle.save().await?;
        Ok(true)
    }

    /// Clear everything persisted for the session.
    pub async fn reset(&self, session_id: &str) -> Result<(), StoreError> {
        let handle = self.open(session_id).await?;
        self.backend.delete_all(session_id).await?;
        drop(handle);
        info!("Session {} reset", session_id);
        Ok(())
    }

    /// Number of session locks currently held or awaited.
    pub fn active_sessions(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive, loaded view of one session.
///
/// Mutations stay in memory until [`SessionHandle::save`]; dropping the
/// handle without saving discards them.
pub struct SessionHandle {
    session_id: String,
    state: AgentState,
    backend: Arc<dyn StateBackend>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn into_state(mut self) -> AgentState {
        std::mem::take(&mut self.state)
    }

    /// Append a user message and count the turn. Returns the new turn count.
    pub fn append_user_message(&mut self, text: impl Into<String>) -> u64 {
        self.state.messages.push(Message::user(text));
        self.state.user_turn_count += 1;
        self.state.user_turn_count
    }

    pub fn append_assistant_message(&mut self, text: impl Into<String>) {
        self.state.messages.push(Message::assistant(text));
    }

    /// Merge an extraction into deal memory and refresh the rolling summary
    /// when the extraction carries a non-empty one.
    pub fn merge_deal_memory(&mut self, partial: &Map<String, Value>) {
        self.state.deal_memory.merge_extraction(partial);

        if let Some(summary) = partial
            .get("rollingSummary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            self.state.rolling_summary = summary.to_string();
        }
    }

    pub fn set_final(&mut self, result: FinalResult) {
        let mut result = result;
        result.summary_bullets.truncate(FinalResult::MAX_SUMMARY_BULLETS);
        self.state.final_result = Some(result);
    }

    pub async fn save(&mut self) -> Result<(), StoreError> {
        self.state.conversation_id.get_or_insert_with(Uuid::new_v4);
        self.backend
            .store(&self.session_id, self.state.to_persisted())
            .await?;
        debug!(
            "Saved session {} ({} messages, turn {})",
            self.session_id,
            self.state.messages.len(),
            self.state.user_turn_count
        );
        Ok(())
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        // Release the lock first, then forget it if nobody else is waiting.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.session_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
