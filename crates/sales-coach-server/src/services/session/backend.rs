use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use super::StoreError;

/// Key/value persistence for session records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Raw record for `session_id`, `None` if nothing was ever stored.
    async fn load(&self, session_id: &str) -> Result<Option<Value>, StoreError>;

    async fn store(&self, session_id: &str, record: Value) -> Result<(), StoreError>;

    /// Remove everything persisted for `session_id`.
    async fn delete_all(&self, session_id: &str) -> Result<(), StoreError>;
}

/// Process-local backend. State does not survive a restart.
#[derive(Default)]
pub struct MemoryBackend {
    records: DashMap<String, Value>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn load(&self, session_id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.records.get(session_id).map(|entry| entry.value().clone()))
    }

    async fn store(&self, session_id: &str, record: Value) -> Result<(), StoreError> {
        self.records.insert(session_id.to_string(), record);
        debug!("Stored session {} in memory backend", session_id);
        Ok(())
    }

    async fn delete_all(&self, session_id: &str) -> Result<(), StoreError> {
        self.records.remove(session_id);
        Ok(())
    }
}
