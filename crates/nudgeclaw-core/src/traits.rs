//! Collaborator seams. Everything downstream of the decision core —
//! the work-item source, content wording, delivery transport, and the
//! persistence engine — lives behind one of these traits and is injected
//! through constructors. No process-wide singletons.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Content, Delivery, NotificationType, ScheduledNotification, UrgencyAssessment,
    UserPreferences, WorkItemSnapshot, Verdict,
};

/// Everything the content generator needs to word one reminder.
#[derive(Debug, Clone)]
pub struct ReminderContext {
    pub user_id: String,
    pub notification_type: NotificationType,
    pub item: WorkItemSnapshot,
    pub urgency: UrgencyAssessment,
}

/// Read-only access to the tracked work items.
///
/// `get_item` reports a missing item as `NudgeError::NotFound`; transient
/// transport failures come back as `NudgeError::Source` so callers can
/// retry. Query methods tolerate empty results.
#[async_trait]
pub trait WorkItemSource: Send + Sync {
    async fn get_item(&self, id: &str) -> Result<WorkItemSnapshot>;

    /// Items with no update for at least `threshold_days`, optionally
    /// restricted to one project.
    async fn query_stale(
        &self,
        threshold_days: f64,
        project: Option<&str>,
    ) -> Result<Vec<WorkItemSnapshot>>;

    /// Items whose deadline falls within the next `days_ahead` days.
    async fn query_near_deadline(
        &self,
        days_ahead: f64,
        project: Option<&str>,
    ) -> Result<Vec<WorkItemSnapshot>>;

    async fn get_assigned_items(&self, user_id: &str) -> Result<Vec<WorkItemSnapshot>>;
}

/// Produces the reminder wording. Tone and templating are its business,
/// not ours.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &ReminderContext,
        preferences: &UserPreferences,
    ) -> Result<Content>;
}

/// Judges and repairs generated content.
#[async_trait]
pub trait ContentValidator: Send + Sync {
    async fn validate(&self, content: &Content) -> Result<Verdict>;

    /// One-shot repair attempt guided by the validator's suggestions.
    async fn repair(&self, content: &Content, suggestions: &[String]) -> Result<Content>;
}

/// Sends a reminder to the user. A `Delivery { delivered: false, .. }`
/// is a soft failure subject to the notification's backoff rules.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(
        &self,
        notification: &ScheduledNotification,
        content: &Content,
    ) -> Result<Delivery>;
}

/// Key-value persistence for engine state snapshots.
///
/// Reads of missing keys return `Ok(None)` — callers treat that as
/// default/empty. A failed write is a hard `NudgeError::Store`.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
}
