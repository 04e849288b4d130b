//! Canonical data model — one set of enums and records shared by every crate.
//!
//! All ordered enums derive `Ord` so comparisons are ordinal, never string
//! based. Weights and batching rules live as methods on the enums themselves
//! so every component sees the same numbers.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════
// Work items
// ═══════════════════════════════════════════════════════

/// Kind of tracked work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Bug,
    Task,
    Story,
    Epic,
    Incident,
}

impl ItemType {
    /// Stable key used for config multiplier lookup.
    pub fn key(&self) -> &'static str {
        match self {
            ItemType::Bug => "bug",
            ItemType::Task => "task",
            ItemType::Story => "story",
            ItemType::Epic => "epic",
            ItemType::Incident => "incident",
        }
    }
}

/// Item priority. Ordinal: Low < Medium < High < Urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Contribution to the composite queue priority.
    pub fn weight(&self) -> u32 {
        match self {
            Priority::Low => 10,
            Priority::Medium => 20,
            Priority::High => 30,
            Priority::Urgent => 40,
        }
    }

    /// Stable key used for config multiplier lookup.
    pub fn key(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

/// Workflow status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Open,
    InProgress,
    Blocked,
    Done,
}

impl ItemStatus {
    /// Done items never generate reminders.
    pub fn is_open(&self) -> bool {
        !matches!(self, ItemStatus::Done)
    }
}

/// Recent-activity signals attached to a work item by the source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ActivitySignals {
    #[serde(default)]
    pub recent_comment: bool,
    #[serde(default)]
    pub recent_worklog: bool,
    #[serde(default)]
    pub recent_status_change: bool,
    /// None = the source could not tell (absent assignee, no history).
    #[serde(default)]
    pub assignee_active: Option<bool>,
    #[serde(default)]
    pub project_active: Option<bool>,
}

/// Immutable-at-read view of one tracked work item.
/// Supplied by the external source; the core never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemSnapshot {
    pub id: String,
    pub item_type: ItemType,
    pub priority: Priority,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee: Option<String>,
    pub project: String,
    #[serde(default)]
    pub signals: ActivitySignals,
}

// ═══════════════════════════════════════════════════════
// Assessments
// ═══════════════════════════════════════════════════════

/// Staleness level. Ordinal: Fresh < Aging < Stale < VeryStale < Abandoned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StalenessLevel {
    Fresh,
    Aging,
    Stale,
    VeryStale,
    Abandoned,
}

/// Deadline urgency. Ordinal: Low < Medium < High < Critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// User capacity. Ordinal: Light < Moderate < Heavy < Overloaded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CapacityLevel {
    Light,
    Moderate,
    Heavy,
    Overloaded,
}

impl CapacityLevel {
    /// Stable key used for config budget lookup.
    pub fn key(&self) -> &'static str {
        match self {
            CapacityLevel::Light => "light",
            CapacityLevel::Moderate => "moderate",
            CapacityLevel::Heavy => "heavy",
            CapacityLevel::Overloaded => "overloaded",
        }
    }
}

/// Output of the staleness analyzer for one item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StalenessAssessment {
    /// Raw calendar days since last update.
    pub days_since_update: f64,
    /// Days after type/priority multipliers and activity adjustment.
    pub adjusted_days: f64,
    pub level: StalenessLevel,
    /// Always within [0.1, 1.0].
    pub confidence: f64,
}

/// Output of the deadline analyzer for one item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeadlineAssessment {
    pub has_deadline: bool,
    /// Negative when overdue. None when there is no deadline at all.
    pub days_remaining: Option<f64>,
    pub urgency: UrgencyLevel,
    pub is_overdue: bool,
}

/// Combined urgency view for one (item, analysis-time) pair.
/// Cheap to recompute; pipeline runs snapshot it for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrgencyAssessment {
    pub item_id: String,
    pub assessed_at: DateTime<Utc>,
    pub staleness: StalenessAssessment,
    pub deadline: DeadlineAssessment,
    /// Weighted staleness/deadline blend, 0..100.
    pub combined_score: f64,
}

/// Per-user workload view, recomputed periodically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWorkloadProfile {
    pub user_id: String,
    pub active_items: usize,
    pub overdue_items: usize,
    /// Fraction of assigned items touched in the trailing window, 0..10.
    pub activity_score: f64,
    pub capacity: CapacityLevel,
    /// Remaining reminders this user should receive today / this week.
    pub daily_budget: u32,
    pub weekly_budget: u32,
    pub assessed_at: DateTime<Utc>,
}

impl UserWorkloadProfile {
    /// Profile used when no workload data is available — treat as light.
    pub fn unknown(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            active_items: 0,
            overdue_items: 0,
            activity_score: 0.0,
            capacity: CapacityLevel::Light,
            daily_budget: 5,
            weekly_budget: 25,
            assessed_at: Utc::now(),
        }
    }
}

// ═══════════════════════════════════════════════════════
// Notifications
// ═══════════════════════════════════════════════════════

/// What kind of reminder this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    StaleReminder,
    DeadlineWarning,
    ProgressSummary,
    TeamEncouragement,
}

impl NotificationType {
    /// Contribution to the composite queue priority.
    pub fn weight(&self) -> u32 {
        match self {
            NotificationType::DeadlineWarning => 35,
            NotificationType::StaleReminder => 25,
            NotificationType::ProgressSummary => 10,
            NotificationType::TeamEncouragement => 5,
        }
    }

    /// Whether items of this type sharing a batch key may be coalesced
    /// into one delivery. The engine only marks eligibility.
    pub fn can_be_batched(&self) -> bool {
        matches!(
            self,
            NotificationType::ProgressSummary | NotificationType::TeamEncouragement
        )
    }

    /// Stable key used for config lookup and batch keys.
    pub fn key(&self) -> &'static str {
        match self {
            NotificationType::StaleReminder => "stale_reminder",
            NotificationType::DeadlineWarning => "deadline_warning",
            NotificationType::ProgressSummary => "progress_summary",
            NotificationType::TeamEncouragement => "team_encouragement",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Lifecycle of a scheduled notification.
/// `Delivered` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Queued,
    Delivered,
    Failed,
    RetryPending,
    Expired,
    Cancelled,
}

impl NotificationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Delivered
                | NotificationStatus::Expired
                | NotificationStatus::Cancelled
        )
    }
}

/// The unit of scheduled work: one reminder owed to one user for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: String,
    pub user_id: String,
    pub item_id: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    /// priority weight + type weight; orders the per-user queue.
    pub composite_priority: u32,
    pub scheduled_for: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub status: NotificationStatus,
    /// When the driver picked this up; cleared if it comes back for retry.
    #[serde(default)]
    pub queued_at: Option<DateTime<Utc>>,
    /// Set when the type is batchable: "type:YYYY-MM-DD".
    pub batch_key: Option<String>,
    pub can_be_batched: bool,
}

impl ScheduledNotification {
    /// Create a pending notification scheduled for `scheduled_for`.
    pub fn new(
        user_id: &str,
        item_id: &str,
        notification_type: NotificationType,
        priority: Priority,
        scheduled_for: DateTime<Utc>,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        let can_be_batched = notification_type.can_be_batched();
        let batch_key = can_be_batched.then(|| {
            format!(
                "{}:{}",
                notification_type.key(),
                scheduled_for.format("%Y-%m-%d")
            )
        });
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            notification_type,
            priority,
            composite_priority: priority.weight() + notification_type.weight(),
            scheduled_for,
            created_at: now,
            attempts: 0,
            max_attempts,
            status: NotificationStatus::Pending,
            queued_at: None,
            batch_key,
            can_be_batched,
        }
    }

    /// True when this notification may be offered for delivery at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            NotificationStatus::Pending | NotificationStatus::RetryPending
        ) && self.scheduled_for <= now
    }
}

// ═══════════════════════════════════════════════════════
// Decisions & preferences
// ═══════════════════════════════════════════════════════

/// Outcome of the scheduling decision engine for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingDecision {
    pub should_schedule: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub user_id: String,
    pub item_id: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    /// Human-readable trail of every gate consulted.
    pub reasoning: Vec<String>,
    /// Up to three fallback times for diagnostics and testing.
    pub alternatives: Vec<DateTime<Utc>>,
    /// 0.0 (hard veto) .. 1.0.
    pub confidence: f64,
}

/// Per-user delivery preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default = "default_true")]
    pub respect_quiet_hours: bool,
    /// Local wall-clock window during which reminders are suppressed.
    /// May wrap midnight (start > end).
    #[serde(default = "default_quiet_start")]
    pub quiet_start: NaiveTime,
    #[serde(default = "default_quiet_end")]
    pub quiet_end: NaiveTime,
    #[serde(default)]
    pub skip_weekends: bool,
    /// Offset applied to UTC to get the user's wall clock.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_true() -> bool {
    true
}
fn default_quiet_start() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap()
}
fn default_quiet_end() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            respect_quiet_hours: true,
            quiet_start: default_quiet_start(),
            quiet_end: default_quiet_end(),
            skip_weekends: false,
            utc_offset_minutes: 0,
        }
    }
}

/// How a user reacted to a past reminder (adaptive tuning input).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOutcome {
    Dismissed,
    Acknowledged,
    Actioned,
    Ignored,
}

impl ResponseOutcome {
    /// Positive responses indicate a good delivery hour.
    pub fn is_positive(&self) -> bool {
        matches!(self, ResponseOutcome::Acknowledged | ResponseOutcome::Actioned)
    }
}

// ═══════════════════════════════════════════════════════
// Collaborator payloads
// ═══════════════════════════════════════════════════════

/// Generated reminder content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub title: String,
    pub body: String,
    /// Deep link / item reference the user can act on.
    pub action_ref: Option<String>,
}

/// Content validator verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub acceptable: bool,
    /// 0.0 .. 1.0 quality/tone score.
    pub score: f64,
    pub suggestions: Vec<String>,
}

/// Delivery channel outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub delivered: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ordered_enums_compare_ordinally() {
        assert!(StalenessLevel::Fresh < StalenessLevel::Aging);
        assert!(StalenessLevel::VeryStale < StalenessLevel::Abandoned);
        assert!(UrgencyLevel::Low < UrgencyLevel::Critical);
        assert!(CapacityLevel::Heavy < CapacityLevel::Overloaded);
        assert!(Priority::Medium < Priority::Urgent);
    }

    #[test]
    fn composite_priority_is_weight_sum() {
        let n = ScheduledNotification::new(
            "u1",
            "PROJ-1",
            NotificationType::DeadlineWarning,
            Priority::Urgent,
            Utc::now(),
            3,
        );
        assert_eq!(n.composite_priority, 40 + 35);
        assert!(n.batch_key.is_none());
        assert!(!n.can_be_batched);
    }

    #[test]
    fn batchable_types_get_a_batch_key() {
        let when = Utc::now();
        let n = ScheduledNotification::new(
            "u1",
            "PROJ-2",
            NotificationType::ProgressSummary,
            Priority::Low,
            when,
            3,
        );
        assert!(n.can_be_batched);
        let key = n.batch_key.unwrap();
        assert!(key.starts_with("progress_summary:"));
        assert!(key.ends_with(&when.format("%Y-%m-%d").to_string()));
    }

    #[test]
    fn readiness_requires_due_time_and_live_status() {
        let now = Utc::now();
        let mut n = ScheduledNotification::new(
            "u1",
            "PROJ-3",
            NotificationType::StaleReminder,
            Priority::Medium,
            now - Duration::minutes(1),
            3,
        );
        assert!(n.is_ready(now));
        n.scheduled_for = now + Duration::hours(1);
        assert!(!n.is_ready(now));
        n.scheduled_for = now - Duration::hours(1);
        n.status = NotificationStatus::Expired;
        assert!(!n.is_ready(now));
        n.status = NotificationStatus::RetryPending;
        assert!(n.is_ready(now));
    }

    #[test]
    fn terminal_statuses() {
        assert!(NotificationStatus::Delivered.is_terminal());
        assert!(NotificationStatus::Expired.is_terminal());
        assert!(NotificationStatus::Cancelled.is_terminal());
        assert!(!NotificationStatus::Failed.is_terminal());
        assert!(!NotificationStatus::RetryPending.is_terminal());
    }
}
