//! Shared fakes for pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use nudgeclaw_core::error::{NudgeError, Result};
use nudgeclaw_core::traits::{DeliveryChannel, WorkItemSource};
use nudgeclaw_core::types::{
    ActivitySignals, Content, Delivery, ItemStatus, ItemType, Priority,
    ScheduledNotification, WorkItemSnapshot,
};

pub fn item(id: &str, assignee: &str, updated_days_ago: i64, now: DateTime<Utc>) -> WorkItemSnapshot {
    WorkItemSnapshot {
        id: id.to_string(),
        item_type: ItemType::Task,
        priority: Priority::Medium,
        status: ItemStatus::InProgress,
        created_at: now - Duration::days(updated_days_ago + 30),
        updated_at: now - Duration::days(updated_days_ago),
        due_date: None,
        assignee: Some(assignee.to_string()),
        project: "PROJ".to_string(),
        signals: ActivitySignals::default(),
    }
}

/// In-memory work-item source. Mutable so tests can close or drop items
/// between scheduling and pickup.
#[derive(Default)]
pub struct FakeSource {
    items: Mutex<HashMap<String, WorkItemSnapshot>>,
}

impl FakeSource {
    pub fn with_items(items: Vec<WorkItemSnapshot>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().map(|i| (i.id.clone(), i)).collect()),
        }
    }

    pub fn set_status(&self, id: &str, status: ItemStatus) {
        if let Some(item) = self.items.lock().unwrap().get_mut(id) {
            item.status = status;
        }
    }

    pub fn remove(&self, id: &str) {
        self.items.lock().unwrap().remove(id);
    }
}

#[async_trait]
impl WorkItemSource for FakeSource {
    async fn get_item(&self, id: &str) -> Result<WorkItemSnapshot> {
        self.items
            .lock()
            .unwrap()
            .get(id)
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
            .lock()
            .unwrap()
            .values()
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
        let horizon = now + Duration::seconds((days_ahead * 86_400.0) as i64);
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
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
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.assignee.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }
}

/// Counts deliveries; can be switched into failure mode.
#[derive(Default)]
pub struct CountingChannel {
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
}

impl CountingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryChannel for CountingChannel {
    async fn deliver(
        &self,
        _notification: &ScheduledNotification,
        _content: &Content,
    ) -> Result<Delivery> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Ok(Delivery {
                delivered: false,
                error: Some("channel down".to_string()),
            })
        } else {
            Ok(Delivery {
                delivered: true,
                error: None,
            })
        }
    }
}
