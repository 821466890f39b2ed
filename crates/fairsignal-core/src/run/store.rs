//! Keyed persistence for in-flight simulated runs.
//!
//! The store abstraction replaces a process-global registry: the engine is
//! handed a `RunStore` and never touches global state. `MemoryRunStore`
//! serves tests and demos; `SqliteRunStore` persists runs as JSON documents
//! through the shared `Database` handle. Remote runs are not stored — the
//! remote provider is authoritative for them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio::sync::RwLock;

use crate::db::Database;
use crate::error::CoreError;
use crate::run::Run;

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn get(&self, run_id: &str) -> Result<Option<Run>, CoreError>;
    async fn put(&self, run: &Run) -> Result<(), CoreError>;
    async fn delete(&self, run_id: &str) -> Result<(), CoreError>;
}

/// In-memory store. Safe for concurrent `get`/`put` per run id; a UI can
/// poll a run while it is being advanced.
#[derive(Default)]
pub struct MemoryRunStore {
    inner: RwLock<HashMap<String, Run>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn get(&self, run_id: &str) -> Result<Option<Run>, CoreError> {
        Ok(self.inner.read().await.get(run_id).cloned())
    }

    async fn put(&self, run: &Run) -> Result<(), CoreError> {
        self.inner
            .write()
            .await
            .insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    async fn delete(&self, run_id: &str) -> Result<(), CoreError> {
        self.inner.write().await.remove(run_id);
        Ok(())
    }
}

/// Durable store backed by the `workflow_runs` table.
#[derive(Clone)]
pub struct SqliteRunStore {
    db: Database,
}

impl SqliteRunStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn get(&self, run_id: &str) -> Result<Option<Run>, CoreError> {
        let id = run_id.to_string();
        let doc: Option<String> = self
            .db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT doc FROM workflow_runs WHERE id = ?1",
                    rusqlite::params![id],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?;

        match doc {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| CoreError::Store(format!("run document decode failed: {e}"))),
            None => Ok(None),
        }
    }

    async fn put(&self, run: &Run) -> Result<(), CoreError> {
        let doc = serde_json::to_string(run)
            .map_err(|e| CoreError::Store(format!("run document encode failed: {e}")))?;
        let id = run.run_id.clone();
        let status = format!("{:?}", run.status);
        let now_ms = chrono::Utc::now().timestamp_millis();

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO workflow_runs (id, status, updated_at, doc) \
                     VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT(id) DO UPDATE SET \
                     status = excluded.status, updated_at = excluded.updated_at, doc = excluded.doc",
                    rusqlite::params![id, status, now_ms, doc],
                )?;
                Ok(())
            })
            .await
    }

    async fn delete(&self, run_id: &str) -> Result<(), CoreError> {
        let id = run_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "DELETE FROM workflow_runs WHERE id = ?1",
                    rusqlite::params![id],
                )?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::ExecutorMode;
    use crate::run::{RunStatus, Step};

    fn sample_run(id: &str) -> Run {
        Run {
            run_id: id.to_string(),
            executor: ExecutorMode::Simulated,
            status: RunStatus::Running,
            steps: vec![Step {
                name: "collect".to_string(),
                details: None,
                requires_approval: false,
                status: RunStatus::Running,
                started_at: Some(Utc::now()),
                finished_at: None,
                error_message: None,
            }],
            started_at: Utc::now(),
            finished_at: None,
            input: serde_json::json!({"kind": "outreach"}),
            output: None,
            error_message: None,
            workflow_name: None,
            remote_status: None,
            remote_model_id: None,
            client_token: None,
            paused_from: None,
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryRunStore::new();
        assert!(store.get("missing").await.unwrap().is_none());

        let run = sample_run("r1");
        store.put(&run).await.unwrap();
        let loaded = store.get("r1").await.unwrap().unwrap();
        assert_eq!(loaded.run_id, "r1");
        assert_eq!(loaded.steps.len(), 1);

        store.delete("r1").await.unwrap();
        assert!(store.get("r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_store_round_trip() {
        let store = SqliteRunStore::new(Database::open_in_memory().unwrap());

        let mut run = sample_run("r2");
        store.put(&run).await.unwrap();

        // Upsert replaces the document.
        run.status = RunStatus::Success;
        store.put(&run).await.unwrap();

        let loaded = store.get("r2").await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Success);

        store.delete("r2").await.unwrap();
        assert!(store.get("r2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteRunStore::new(Database::open(path).unwrap());
            store.put(&sample_run("r3")).await.unwrap();
        }

        let store = SqliteRunStore::new(Database::open(path).unwrap());
        assert!(store.get("r3").await.unwrap().is_some());
    }
}
