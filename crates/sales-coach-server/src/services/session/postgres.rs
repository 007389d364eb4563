use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::time::Duration;
use tracing::{debug, info};

use super::{StateBackend, StoreError};
use crate::config::StorageConfig;

#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    pub async fn new(config: &StorageConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
            .connect(&config.url)
            .await?;

        // Test connection
        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// One JSONB row per session in `agent_sessions`.
pub struct PostgresBackend {
    pool: DbPool,
}

impl PostgresBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create the sessions table if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS agent_sessions (
                session_id TEXT PRIMARY KEY,
                state JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#,
        )
        .execute(self.pool.get_pool())
        .await?;

        info!("agent_sessions table ready");
        Ok(())
    }
}

#[async_trait]
impl StateBackend for PostgresBackend {
    async fn load(&self, session_id: &str) -> Result<Option<Value>, StoreError> {
        let record = sqlx::query_scalar::<_, Json<Value>>(
            "SELECT state FROM agent_sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(record.map(|Json(value)| value))
    }

    async fn store(&self, session_id: &str, record: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO agent_sessions (session_id, state, updated_at)
               VALUES ($1, $2, now())
               ON CONFLICT (session_id)
               DO UPDATE SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at"#,
        )
        .bind(session_id)
        .bind(Json(record))
        .execute(self.pool.get_pool())
        .await?;

        debug!("Persisted session {}", session_id);
        Ok(())
    }

    async fn delete_all(&self, session_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM agent_sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(self.pool.get_pool())
            .await?;

        debug!("Deleted {} row(s) for session {}", result.rows_affected(), session_id);
        Ok(())
    }
}
