//! Per-user notification queue.
//!
//! Ordering is a strict weak order: composite priority descending, ties
//! broken by creation time ascending — deterministic for testing. Each
//! queue has exactly one writer (the engine).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use nudgeclaw_core::error::{NudgeError, Result};
use nudgeclaw_core::types::{NotificationStatus, NotificationType, ScheduledNotification};

/// One user's pending notifications plus queue-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationQueue {
    pub user_id: String,
    items: Vec<ScheduledNotification>,
    /// Earliest scheduled_for among live items.
    pub next_processing_at: Option<DateTime<Utc>>,
    /// Delivery failures observed on this queue since startup.
    pub error_count: u32,
}

impl NotificationQueue {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            items: Vec::new(),
            next_processing_at: None,
            error_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ScheduledNotification] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&ScheduledNotification> {
        self.items.iter().find(|n| n.id == id)
    }

    /// A live (non-terminal) notification already exists for this
    /// (item, type) pair.
    pub fn has_live(&self, item_id: &str, notification_type: NotificationType) -> bool {
        self.items.iter().any(|n| {
            n.item_id == item_id
                && n.notification_type == notification_type
                && !n.status.is_terminal()
        })
    }

    /// Insert, enforcing at most one non-terminal notification per
    /// (user, item, type).
    pub fn insert(&mut self, notification: ScheduledNotification) -> Result<()> {
        if self.has_live(&notification.item_id, notification.notification_type) {
            return Err(NudgeError::Scheduling(format!(
                "duplicate live notification for ({}, {}, {})",
                self.user_id, notification.item_id, notification.notification_type
            )));
        }
        self.items.push(notification);
        self.resort();
        Ok(())
    }

    /// Due, still-live notifications in composite-priority order,
    /// capped at `max_count`.
    pub fn ready(&self, now: DateTime<Utc>, max_count: usize) -> Vec<ScheduledNotification> {
        self.items
            .iter()
            .filter(|n| n.is_ready(now))
            .take(max_count)
            .cloned()
            .collect()
    }

    /// Move a picked-up notification to Queued so a second tick cannot
    /// offer it again.
    pub fn mark_queued(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.status.is_terminal() => {
                n.status = NotificationStatus::Queued;
                n.queued_at = Some(now);
                self.recompute_next();
                true
            }
            _ => false,
        }
    }

    /// Demote pickups that never reached a terminal state. A crash or a
    /// pipeline error can leave an item parked in Queued, which `ready`
    /// never offers again; an interruption counts as a failed attempt, so
    /// the normal backoff (and eventual expiry) applies.
    pub fn requeue_interrupted(
        &mut self,
        now: DateTime<Utc>,
        min_queued_age: Duration,
        base_delay: Duration,
        multiplier: f64,
    ) -> Vec<ScheduledNotification> {
        let ids: Vec<String> = self
            .items
            .iter()
            .filter(|n| {
                n.status == NotificationStatus::Queued
                    && n.queued_at.map_or(true, |t| now - t >= min_queued_age)
            })
            .map(|n| n.id.clone())
            .collect();
        ids.iter()
            .filter_map(|id| self.record_failure(id, now, base_delay, multiplier))
            .collect()
    }

    /// Terminal success: mark delivered and drop from the queue.
    pub fn mark_delivered(&mut self, id: &str) -> Option<ScheduledNotification> {
        let idx = self.items.iter().position(|n| n.id == id)?;
        let mut n = self.items.remove(idx);
        n.status = NotificationStatus::Delivered;
        self.recompute_next();
        Some(n)
    }

    /// Delivery failure: apply backoff or expire.
    ///
    /// While `attempts < max_attempts` the notification is pushed to
    /// `now + base_delay * multiplier^attempts` and becomes RetryPending.
    /// Once attempts are exhausted it expires and is dropped for good.
    pub fn record_failure(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
        base_delay: Duration,
        multiplier: f64,
    ) -> Option<ScheduledNotification> {
        let idx = self.items.iter().position(|n| n.id == id)?;
        self.error_count += 1;
        let n = &mut self.items[idx];
        n.attempts += 1;
        if n.attempts >= n.max_attempts {
            let mut expired = self.items.remove(idx);
            expired.status = NotificationStatus::Expired;
            self.recompute_next();
            return Some(expired);
        }
        let factor = multiplier.powi(n.attempts as i32);
        let delay_secs = (base_delay.num_seconds() as f64 * factor) as i64;
        n.scheduled_for = now + Duration::seconds(delay_secs);
        n.status = NotificationStatus::RetryPending;
        n.queued_at = None;
        let snapshot = n.clone();
        self.resort();
        Some(snapshot)
    }

    /// Cancel a notification before pickup (e.g. the item was completed).
    pub fn cancel(&mut self, id: &str) -> Option<ScheduledNotification> {
        let idx = self
            .items
            .iter()
            .position(|n| n.id == id && !n.status.is_terminal())?;
        let mut n = self.items.remove(idx);
        n.status = NotificationStatus::Cancelled;
        self.recompute_next();
        Some(n)
    }

    fn resort(&mut self) {
        self.items.sort_by(|a, b| {
            b.composite_priority
                .cmp(&a.composite_priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        self.recompute_next();
    }

    fn recompute_next(&mut self) {
        self.next_processing_at = self
            .items
            .iter()
            .filter(|n| !n.status.is_terminal())
            .map(|n| n.scheduled_for)
            .min();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudgeclaw_core::types::Priority;

    fn notification(composite: u32, due_minutes_ago: i64) -> ScheduledNotification {
        let mut n = ScheduledNotification::new(
            "maria",
            &format!("PROJ-{composite}"),
            NotificationType::StaleReminder,
            Priority::Medium,
            Utc::now() - Duration::minutes(due_minutes_ago),
            3,
        );
        n.composite_priority = composite;
        n
    }

    #[test]
    fn ready_returns_descending_composite_priority() {
        let mut q = NotificationQueue::new("maria");
        for composite in [30, 75, 50] {
            q.insert(notification(composite, 5)).unwrap();
        }
        let ready = q.ready(Utc::now(), 10);
        let order: Vec<u32> = ready.iter().map(|n| n.composite_priority).collect();
        assert_eq!(order, vec![75, 50, 30]);
    }

    #[test]
    fn ties_break_by_creation_time() {
        let mut q = NotificationQueue::new("maria");
        let mut first = notification(50, 5);
        first.item_id = "PROJ-A".into();
        let mut second = notification(50, 5);
        second.item_id = "PROJ-B".into();
        second.created_at = first.created_at + Duration::seconds(1);
        q.insert(second.clone()).unwrap();
        q.insert(first.clone()).unwrap();
        let ready = q.ready(Utc::now(), 10);
        assert_eq!(ready[0].id, first.id);
        assert_eq!(ready[1].id, second.id);
    }

    #[test]
    fn future_items_are_not_ready() {
        let mut q = NotificationQueue::new("maria");
        q.insert(notification(40, -60)).unwrap(); // due in an hour
        assert!(q.ready(Utc::now(), 10).is_empty());
        assert!(q.next_processing_at.is_some());
    }

    #[test]
    fn duplicate_live_pair_is_rejected() {
        let mut q = NotificationQueue::new("maria");
        let a = notification(50, 5);
        let mut b = notification(50, 5);
        b.item_id = a.item_id.clone();
        q.insert(a).unwrap();
        assert!(matches!(q.insert(b), Err(NudgeError::Scheduling(_))));
    }

    #[test]
    fn three_failures_expire_with_max_attempts_three() {
        let mut q = NotificationQueue::new("maria");
        let n = notification(50, 5);
        let id = n.id.clone();
        q.insert(n).unwrap();
        let base = Duration::minutes(30);

        let first = q.record_failure(&id, Utc::now(), base, 2.0).unwrap();
        assert_eq!(first.status, NotificationStatus::RetryPending);
        assert_eq!(first.attempts, 1);

        // becomes ready again once the backoff elapses
        let later = first.scheduled_for + Duration::seconds(1);
        assert_eq!(q.ready(later, 10).len(), 1);

        q.record_failure(&id, Utc::now(), base, 2.0).unwrap();
        let last = q.record_failure(&id, Utc::now(), base, 2.0).unwrap();
        assert_eq!(last.status, NotificationStatus::Expired);
        assert_eq!(last.attempts, 3);

        // never offered again
        assert!(q.ready(Utc::now() + Duration::days(30), 10).is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn backoff_grows_with_attempts() {
        let mut q = NotificationQueue::new("maria");
        let mut n = notification(50, 5);
        n.max_attempts = 5;
        let id = n.id.clone();
        q.insert(n).unwrap();
        let now = Utc::now();
        let base = Duration::minutes(30);

        let first = q.record_failure(&id, now, base, 2.0).unwrap();
        let second = q.record_failure(&id, now, base, 2.0).unwrap();
        // 30 * 2^1 = 60min, then 30 * 2^2 = 120min
        assert_eq!(first.scheduled_for, now + Duration::minutes(60));
        assert_eq!(second.scheduled_for, now + Duration::minutes(120));
    }

    #[test]
    fn cancelled_items_vanish() {
        let mut q = NotificationQueue::new("maria");
        let n = notification(50, 5);
        let id = n.id.clone();
        q.insert(n).unwrap();
        let cancelled = q.cancel(&id).unwrap();
        assert_eq!(cancelled.status, NotificationStatus::Cancelled);
        assert!(q.cancel(&id).is_none());
        assert!(q.ready(Utc::now(), 10).is_empty());
    }

    #[test]
    fn queued_items_are_not_offered_twice() {
        let mut q = NotificationQueue::new("maria");
        let n = notification(50, 5);
        let id = n.id.clone();
        q.insert(n).unwrap();
        let now = Utc::now();
        assert_eq!(q.ready(now, 10).len(), 1);
        assert!(q.mark_queued(&id, now));
        assert!(q.ready(now, 10).is_empty());
    }

    #[test]
    fn interrupted_pickups_go_back_through_backoff() {
        let mut q = NotificationQueue::new("maria");
        let n = notification(50, 5);
        let id = n.id.clone();
        q.insert(n).unwrap();
        let now = Utc::now();
        let base = Duration::minutes(30);
        assert!(q.mark_queued(&id, now));

        // too fresh to count as interrupted
        assert!(q
            .requeue_interrupted(now, Duration::minutes(10), base, 2.0)
            .is_empty());

        let later = now + Duration::minutes(11);
        let recovered = q.requeue_interrupted(later, Duration::minutes(10), base, 2.0);
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].status, NotificationStatus::RetryPending);
        assert_eq!(recovered[0].attempts, 1);

        // offered again once the backoff elapses
        let due = recovered[0].scheduled_for + Duration::seconds(1);
        assert_eq!(q.ready(due, 10).len(), 1);
    }
}
