//! JSON-file work-item source. Good enough for local runs and demos; a
//! real tracker integration implements the same trait against its API.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use nudgeclaw_core::error::{NudgeError, Result};
use nudgeclaw_core::traits::WorkItemSource;
use nudgeclaw_core::types::WorkItemSnapshot;

/// Reads a JSON array of work items from disk. `reload` picks up edits
/// without a restart.
#[derive(Debug)]
pub struct FileWorkItemSource {
    path: PathBuf,
    items: RwLock<Vec<WorkItemSnapshot>>,
}

impl FileWorkItemSource {
    pub fn load(path: &Path) -> Result<Self> {
        let items = Self::read_items(path)?;
        tracing::info!("📋 Loaded {} work item(s) from {}", items.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            items: RwLock::new(items),
        })
    }

    pub async fn reload(&self) -> Result<usize> {
        let items = Self::read_items(&self.path)?;
        let count = items.len();
        *self.items.write().await = items;
        Ok(count)
    }

    fn read_items(path: &Path) -> Result<Vec<WorkItemSnapshot>> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| NudgeError::Source(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| NudgeError::Source(format!("parse {}: {e}", path.display())))
    }
}

#[async_trait]
impl WorkItemSource for FileWorkItemSource {
    async fn get_item(&self, id: &str) -> Result<WorkItemSnapshot> {
        self.items
            .read()
            .await
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| NudgeError::NotFound(format!("item {id}")))
    }

    async fn query_stale(
        &self,
        threshold_days: f64,
        project: Option<&str>,
    ) -> Result<Vec<WorkItemSnapshot>> {
        let now = Utc::now();
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|i| {
                let days = (now - i.updated_at).num_seconds() as f64 / 86_400.0;
                days >= threshold_days
                    && i.status.is_open()
                    && project.map_or(true, |p| i.project == p)
            })
            .cloned()
            .collect())
    }

    async fn query_near_deadline(
        &self,
        days_ahead: f64,
        project: Option<&str>,
    ) -> Result<Vec<WorkItemSnapshot>> {
        let now = Utc::now();
        let horizon = now + chrono::Duration::seconds((days_ahead * 86_400.0) as i64);
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|i| {
                i.due_date.is_some_and(|d| d <= horizon)
                    && i.status.is_open()
                    && project.map_or(true, |p| i.project == p)
            })
            .cloned()
            .collect())
    }

    async fn get_assigned_items(&self, user_id: &str) -> Result<Vec<WorkItemSnapshot>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|i| i.assignee.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_json() -> String {
        let now = Utc::now();
        serde_json::json!([
            {
                "id": "PROJ-1",
                "item_type": "task",
                "priority": "medium",
                "status": "in_progress",
                "created_at": (now - chrono::Duration::days(40)).to_rfc3339(),
                "updated_at": (now - chrono::Duration::days(12)).to_rfc3339(),
                "due_date": null,
                "assignee": "maria",
                "project": "PROJ"
            },
            {
                "id": "PROJ-2",
                "item_type": "bug",
                "priority": "high",
                "status": "done",
                "created_at": (now - chrono::Duration::days(40)).to_rfc3339(),
                "updated_at": (now - chrono::Duration::days(20)).to_rfc3339(),
                "due_date": null,
                "assignee": "maria",
                "project": "PROJ"
            }
        ])
        .to_string()
    }

    #[tokio::test]
    async fn loads_and_queries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();

        let source = FileWorkItemSource::load(file.path()).unwrap();
        let item = source.get_item("PROJ-1").await.unwrap();
        assert_eq!(item.assignee.as_deref(), Some("maria"));

        // closed items never count as stale
        let stale = source.query_stale(10.0, None).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, "PROJ-1");

        let assigned = source.get_assigned_items("maria").await.unwrap();
        assert_eq!(assigned.len(), 2);

        assert!(matches!(
            source.get_item("NOPE-1").await,
            Err(NudgeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reload_picks_up_file_edits() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();
        file.flush().unwrap();

        let source = FileWorkItemSource::load(file.path()).unwrap();
        assert!(matches!(
            source.get_item("PROJ-3").await,
            Err(NudgeError::NotFound(_))
        ));

        let now = Utc::now();
        let mut items: Vec<serde_json::Value> =
            serde_json::from_str(&sample_json()).unwrap();
        items.push(serde_json::json!({
            "id": "PROJ-3",
            "item_type": "task",
            "priority": "low",
            "status": "open",
            "created_at": (now - chrono::Duration::days(3)).to_rfc3339(),
            "updated_at": (now - chrono::Duration::days(1)).to_rfc3339(),
            "due_date": null,
            "assignee": "jo",
            "project": "PROJ"
        }));
        std::fs::write(file.path(), serde_json::to_string(&items).unwrap()).unwrap();

        let count = source.reload().await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(
            source.get_item("PROJ-3").await.unwrap().assignee.as_deref(),
            Some("jo")
        );
    }

    #[tokio::test]
    async fn missing_file_is_a_source_error() {
        let err = FileWorkItemSource::load(Path::new("/nonexistent/items.json")).unwrap_err();
        assert!(matches!(err, NudgeError::Source(_)));
    }
}
