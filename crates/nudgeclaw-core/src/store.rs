//! In-memory `PersistentStore` plus the deterministic composite keys every
//! store implementation shares.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::traits::PersistentStore;

/// Key for one scheduled notification.
pub fn notification_key(id: &str) -> String {
    format!("notification:{id}")
}

/// Key for a user's queue snapshot.
pub fn queue_key(user_id: &str) -> String {
    format!("user:{user_id}:queue")
}

/// Key for a user's workload profile snapshot.
pub fn workload_key(user_id: &str) -> String {
    format!("user:{user_id}:workload")
}

/// Key for a user's delivery preferences.
pub fn prefs_key(user_id: &str) -> String {
    format!("user:{user_id}:prefs")
}

/// Key for one pipeline run record.
pub fn run_key(id: &str) -> String {
    format!("run:{id}")
}

/// HashMap-backed store. Good for tests and single-process deployments
/// that can afford to lose state on restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys (test helper).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.inner.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.inner.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.inner.lock().await.remove(key).is_some())
    }
}
