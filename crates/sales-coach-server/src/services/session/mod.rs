//! Per-session state storage
//!
//! - `StateBackend`: durable key/value persistence (one JSON record per session)
//! - `SessionStore`: single-writer access per session id on top of a backend

mod backend;
mod postgres;
mod store;

pub use backend::{MemoryBackend, StateBackend};
pub use postgres::{DbPool, PostgresBackend};
pub use store::{SessionHandle, SessionStore};

#[cfg(test)]
pub use backend::MockStateBackend;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}
