//! The scheduling engine — single owner of every user queue and all rate
//! counters. One writer at a time: callers hold the engine behind a tokio
//! Mutex, which is what makes the cap check and the matching increment
//! atomic.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};

use nudgeclaw_core::config::NudgeConfig;
use nudgeclaw_core::error::{NudgeError, Result};
use nudgeclaw_core::store::{notification_key, queue_key, workload_key};
use nudgeclaw_core::traits::PersistentStore;
use nudgeclaw_core::types::{
    NotificationStatus, NotificationType, Priority, ResponseOutcome, ScheduledNotification,
    SchedulingDecision, UrgencyAssessment, UserPreferences, UserWorkloadProfile,
};

use crate::adaptive::AdaptiveTuner;
use crate::decision::{CandidateContext, DecisionEngine, GateCounters};
use crate::limits::RateLimiter;
use crate::queue::NotificationQueue;

/// A pickup still sitting in Queued this long after the driver took it was
/// interrupted mid-pipeline and goes back through the normal backoff.
const QUEUED_RECOVERY_MINUTES: i64 = 10;

pub struct SchedulerEngine {
    decision: DecisionEngine,
    config: nudgeclaw_core::config::SchedulerConfig,
    queues: HashMap<String, NotificationQueue>,
    limits: RateLimiter,
    adaptive: AdaptiveTuner,
    store: Arc<dyn PersistentStore>,
    /// Round-robin cursor for fair pickup across users.
    rr_cursor: usize,
}

impl SchedulerEngine {
    pub fn new(config: &NudgeConfig, store: Arc<dyn PersistentStore>) -> Self {
        Self {
            decision: DecisionEngine::new(
                config.scheduler.clone(),
                config.calendar.clone(),
            ),
            config: config.scheduler.clone(),
            queues: HashMap::new(),
            limits: RateLimiter::new(),
            adaptive: AdaptiveTuner::new(config.scheduler.adaptive_min_samples),
            store,
            rr_cursor: 0,
        }
    }

    /// Run the gate chain for one candidate. Never an error — vetoes come
    /// back as decisions with reasoning.
    #[allow(clippy::too_many_arguments)]
    pub async fn decide(
        &mut self,
        user_id: &str,
        item_id: &str,
        notification_type: NotificationType,
        priority: Priority,
        urgency: &UrgencyAssessment,
        workload: &UserWorkloadProfile,
        preferences: &UserPreferences,
        now: DateTime<Utc>,
    ) -> SchedulingDecision {
        self.ensure_queue(user_id, now).await;

        let counters = GateCounters {
            daily_count: self.limits.daily_count(user_id, now),
            hourly_count: self.limits.hourly_count(user_id, now),
            last_of_type: self.limits.last_of_type(user_id, notification_type),
            duplicate_live: self
                .queues
                .get(user_id)
                .is_some_and(|q| q.has_live(item_id, notification_type)),
        };

        let adaptive_hour = self.adaptive.suggest(user_id).map(|s| {
            tracing::info!(
                "🧭 Adaptive suggestion for {user_id}: prefer {:02}:00 ({:?} impact) — {}",
                s.preferred_hour,
                s.impact,
                s.reason
            );
            s.preferred_hour
        });

        let ctx = CandidateContext {
            user_id,
            item_id,
            notification_type,
            priority,
            urgency,
            workload,
            preferences,
        };
        let decision = self.decision.decide(&ctx, &counters, adaptive_hour, now);
        if decision.should_schedule {
            tracing::debug!(
                "✅ {user_id}/{item_id}/{notification_type}: schedule at {:?}",
                decision.scheduled_for
            );
        } else {
            tracing::debug!(
                "🚫 {user_id}/{item_id}/{notification_type}: vetoed — {:?}",
                decision.reasoning.last()
            );
        }
        decision
    }

    /// Turn an accepted decision into a queued notification. Counts it
    /// against the rate windows in the same critical section as the check
    /// that admitted it.
    pub async fn enqueue(
        &mut self,
        decision: &SchedulingDecision,
        now: DateTime<Utc>,
    ) -> Result<ScheduledNotification> {
        if !decision.should_schedule {
            return Err(NudgeError::Scheduling(
                "cannot enqueue a vetoed decision".into(),
            ));
        }
        // The gates ran in decide, but the engine lock may have been
        // released since. Re-check the rate caps under this acquisition so
        // two stale decisions cannot both spend the last slot.
        let user_id = &decision.user_id;
        if self.limits.daily_count(user_id, now) >= self.config.daily_cap
            || self.limits.hourly_count(user_id, now) >= self.config.hourly_cap
        {
            return Err(NudgeError::Scheduling(format!(
                "rate cap reached for {user_id} since the decision was made"
            )));
        }
        let scheduled_for = decision.scheduled_for.unwrap_or(now);
        let notification = ScheduledNotification::new(
            &decision.user_id,
            &decision.item_id,
            decision.notification_type,
            decision.priority,
            scheduled_for,
            self.config.max_attempts,
        );

        self.ensure_queue(&decision.user_id, now).await;
        let queue = self
            .queues
            .entry(decision.user_id.clone())
            .or_insert_with(|| NotificationQueue::new(&decision.user_id));
        queue.insert(notification.clone())?;
        self.limits
            .record(&decision.user_id, decision.notification_type, now);

        // Writes are hard failures; roll the insert back so memory and
        // store cannot disagree about a live notification.
        if let Err(e) = self.persist_notification(&notification).await {
            if let Some(q) = self.queues.get_mut(&decision.user_id) {
                q.cancel(&notification.id);
            }
            return Err(e);
        }
        self.persist_queue(&decision.user_id).await?;

        tracing::info!(
            "📥 Enqueued {} for {} (item {}, composite {}, at {})",
            notification.notification_type,
            notification.user_id,
            notification.item_id,
            notification.composite_priority,
            notification.scheduled_for.to_rfc3339()
        );
        Ok(notification)
    }

    /// Due notifications for one user, highest composite priority first.
    pub async fn ready_for_delivery(
        &mut self,
        user_id: &str,
        max_count: usize,
        now: DateTime<Utc>,
    ) -> Vec<ScheduledNotification> {
        self.ensure_queue(user_id, now).await;
        self.queues
            .get(user_id)
            .map(|q| q.ready(now, max_count))
            .unwrap_or_default()
    }

    /// Collect up to `max_count` due notifications across all users,
    /// round-robin so no user starves another, and mark them Queued so a
    /// second tick cannot pick them up again.
    pub async fn collect_ready(
        &mut self,
        max_count: usize,
        now: DateTime<Utc>,
    ) -> Vec<ScheduledNotification> {
        let mut users: Vec<String> = self.queues.keys().cloned().collect();
        users.sort();
        if users.is_empty() {
            return Vec::new();
        }
        self.rr_cursor = (self.rr_cursor + 1) % users.len();
        users.rotate_left(self.rr_cursor);

        let mut picked = Vec::new();
        for user in &users {
            if picked.len() >= max_count {
                break;
            }
            let recovered = self.requeue_interrupted(user, now).await;
            let budget = max_count - picked.len();
            let ready = self
                .queues
                .get(user)
                .map(|q| q.ready(now, budget))
                .unwrap_or_default();
            if ready.is_empty() {
                if recovered > 0 {
                    if let Err(e) = self.persist_queue(user).await {
                        tracing::error!("💾 Queue snapshot write failed for {user}: {e}");
                    }
                }
                continue;
            }
            if let Some(queue) = self.queues.get_mut(user) {
                for n in &ready {
                    queue.mark_queued(&n.id, now);
                }
            }
            if let Err(e) = self.persist_queue(user).await {
                tracing::error!("💾 Queue snapshot write failed for {user}: {e}");
            }
            picked.extend(ready);
        }
        picked
    }

    /// Hand Queued items whose pipeline never finished back to the backoff.
    /// Returns how many were demoted.
    async fn requeue_interrupted(&mut self, user_id: &str, now: DateTime<Utc>) -> usize {
        let Some(queue) = self.queues.get_mut(user_id) else {
            return 0;
        };
        let recovered = queue.requeue_interrupted(
            now,
            Duration::minutes(QUEUED_RECOVERY_MINUTES),
            Duration::minutes(self.config.base_delay_minutes),
            self.config.backoff_multiplier,
        );
        for n in &recovered {
            tracing::warn!(
                "🔁 Requeued interrupted pickup {} for {user_id} ({:?})",
                n.id,
                n.status
            );
            if let Err(e) = self.persist_notification(n).await {
                tracing::error!("💾 Failed to persist requeued notification: {e}");
            }
        }
        recovered.len()
    }

    /// Delivery succeeded: terminal state, drop from queue.
    pub async fn record_delivery(
        &mut self,
        user_id: &str,
        notification_id: &str,
    ) -> Result<()> {
        let delivered = self
            .queues
            .get_mut(user_id)
            .and_then(|q| q.mark_delivered(notification_id))
            .ok_or_else(|| {
                NudgeError::NotFound(format!("notification {notification_id}"))
            })?;
        self.persist_notification(&delivered).await?;
        self.persist_queue(user_id).await?;
        tracing::info!(
            "📨 Delivered {} to {} (attempt {})",
            delivered.notification_type,
            user_id,
            delivered.attempts + 1
        );
        Ok(())
    }

    /// Delivery failed: apply backoff, or expire once attempts run out.
    pub async fn record_failure(
        &mut self,
        user_id: &str,
        notification_id: &str,
        now: DateTime<Utc>,
    ) -> Result<NotificationStatus> {
        let base = Duration::minutes(self.config.base_delay_minutes);
        let updated = self
            .queues
            .get_mut(user_id)
            .and_then(|q| {
                q.record_failure(notification_id, now, base, self.config.backoff_multiplier)
            })
            .ok_or_else(|| {
                NudgeError::NotFound(format!("notification {notification_id}"))
            })?;
        self.persist_notification(&updated).await?;
        self.persist_queue(user_id).await?;

        match updated.status {
            NotificationStatus::Expired => {
                tracing::warn!(
                    "⏳ {} for {} expired after {} attempts",
                    updated.notification_type,
                    user_id,
                    updated.attempts
                );
            }
            _ => {
                tracing::info!(
                    "🔁 {} for {} retrying at {} (attempt {}/{})",
                    updated.notification_type,
                    user_id,
                    updated.scheduled_for.to_rfc3339(),
                    updated.attempts,
                    updated.max_attempts
                );
            }
        }
        Ok(updated.status)
    }

    /// Cancel a notification before pickup (item closed, user left).
    /// The driver tolerates ids vanishing between scheduling and pickup.
    pub async fn cancel(&mut self, notification_id: &str) -> bool {
        let Some(user_id) = self
            .queues
            .iter()
            .find(|(_, q)| q.get(notification_id).is_some())
            .map(|(u, _)| u.clone())
        else {
            return false;
        };
        let Some(cancelled) = self
            .queues
            .get_mut(&user_id)
            .and_then(|q| q.cancel(notification_id))
        else {
            return false;
        };
        if let Err(e) = self.persist_notification(&cancelled).await {
            tracing::error!("💾 Failed to persist cancellation: {e}");
        }
        if let Err(e) = self.persist_queue(&user_id).await {
            tracing::error!("💾 Failed to persist queue after cancellation: {e}");
        }
        tracing::info!("🗑️ Cancelled notification {notification_id} for {user_id}");
        true
    }

    pub fn queue_snapshot(&self, user_id: &str) -> Option<&NotificationQueue> {
        self.queues.get(user_id)
    }

    /// Feed a user's reaction back into the adaptive tuner.
    pub fn record_response(
        &mut self,
        user_id: &str,
        delivered_at: DateTime<Utc>,
        outcome: ResponseOutcome,
    ) {
        self.adaptive
            .record(user_id, delivered_at.hour(), outcome);
    }

    /// Snapshot a workload profile for operators and restarts.
    pub async fn persist_workload(&self, profile: &UserWorkloadProfile) -> Result<()> {
        self.store
            .set(&workload_key(&profile.user_id), serde_json::to_value(profile)?)
            .await
    }

    /// Lazily hydrate a user's queue from the store. Missing or unreadable
    /// snapshots fall back to an empty queue — reads are non-critical.
    ///
    /// A hydrated snapshot can carry items a previous process marked
    /// Queued and never finished; those are demoted immediately so they
    /// re-enter the retry cycle instead of stranding forever.
    async fn ensure_queue(&mut self, user_id: &str, now: DateTime<Utc>) {
        if self.queues.contains_key(user_id) {
            return;
        }
        let mut queue = match self.store.get(&queue_key(user_id)).await {
            Ok(Some(value)) => match serde_json::from_value::<NotificationQueue>(value) {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!("⚠️ Corrupt queue snapshot for {user_id}: {e}");
                    NotificationQueue::new(user_id)
                }
            },
            Ok(None) => NotificationQueue::new(user_id),
            Err(e) => {
                tracing::warn!("⚠️ Queue snapshot read failed for {user_id}: {e}");
                NotificationQueue::new(user_id)
            }
        };
        let interrupted = queue.requeue_interrupted(
            now,
            Duration::zero(),
            Duration::minutes(self.config.base_delay_minutes),
            self.config.backoff_multiplier,
        );
        self.queues.insert(user_id.to_string(), queue);
        if interrupted.is_empty() {
            return;
        }
        tracing::warn!(
            "🔁 Recovered {} interrupted pickup(s) for {user_id} on hydration",
            interrupted.len()
        );
        for n in &interrupted {
            if let Err(e) = self.persist_notification(n).await {
                tracing::error!("💾 Failed to persist recovered notification: {e}");
            }
        }
        if let Err(e) = self.persist_queue(user_id).await {
            tracing::error!("💾 Queue snapshot write failed for {user_id}: {e}");
        }
    }

    async fn persist_notification(&self, n: &ScheduledNotification) -> Result<()> {
        self.store
            .set(&notification_key(&n.id), serde_json::to_value(n)?)
            .await
    }

    async fn persist_queue(&self, user_id: &str) -> Result<()> {
        if let Some(queue) = self.queues.get(user_id) {
            self.store
                .set(&queue_key(user_id), serde_json::to_value(queue)?)
                .await?;
        }
        Ok(())
    }
}
