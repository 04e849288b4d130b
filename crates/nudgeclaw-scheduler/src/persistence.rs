//! SQLite-backed persistence for notifications, queue snapshots, workload
//! profiles, and pipeline runs. Replaces the in-memory store in production
//! so queues survive restarts.

use std::path::Path;

use tokio::sync::Mutex;

use nudgeclaw_core::error::{NudgeError, Result};
use nudgeclaw_core::traits::PersistentStore;

/// SQLite-backed key/value store. Everything goes through one table: keys
/// are namespaced strings (`notification:{id}`, `user:{id}:queue`, ...) and
/// values are JSON documents.
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| NudgeError::Store(format!("DB open: {e}")))?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// An in-process database for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| NudgeError::Store(format!("DB open: {e}")))?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &rusqlite::Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv_state (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,       -- JSON document
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| NudgeError::Store(format!("DB migrate: {e}")))?;
        Ok(())
    }

    /// List keys under a namespace prefix, e.g. `notification:`.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT key FROM kv_state WHERE key LIKE ?1 || '%' ORDER BY key")
            .map_err(|e| NudgeError::Store(format!("DB prepare: {e}")))?;
        let rows = stmt
            .query_map([prefix], |row| row.get::<_, String>(0))
            .map_err(|e| NudgeError::Store(format!("DB query: {e}")))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(|e| NudgeError::Store(format!("DB row: {e}")))?);
        }
        Ok(keys)
    }
}

#[async_trait::async_trait]
impl PersistentStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT value FROM kv_state WHERE key = ?1")
            .map_err(|e| NudgeError::Store(format!("DB prepare: {e}")))?;
        let mut rows = stmt
            .query([key])
            .map_err(|e| NudgeError::Store(format!("DB query: {e}")))?;
        match rows
            .next()
            .map_err(|e| NudgeError::Store(format!("DB row: {e}")))?
        {
            Some(row) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| NudgeError::Store(format!("DB column: {e}")))?;
                let value = serde_json::from_str(&raw)
                    .map_err(|e| NudgeError::Store(format!("corrupt value at {key}: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO kv_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            rusqlite::params![key, value.to_string(), chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| NudgeError::Store(format!("DB write at {key}: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute("DELETE FROM kv_state WHERE key = ?1", [key])
            .map_err(|e| NudgeError::Store(format!("DB delete at {key}: {e}")))?;
        Ok(affected > 0)
    }
}
