//! High-level reminder service: analyze a candidate, run it through the
//! scheduling gates, and enqueue the survivors. `sweep` is the batch
//! entry point operators call on a cron-like cadence.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use nudgeclaw_analyzers::{DeadlineAnalyzer, StalenessAnalyzer, UrgencyScorer, WorkloadAnalyzer};
use nudgeclaw_core::config::NudgeConfig;
use nudgeclaw_core::error::{NudgeError, Result};
use nudgeclaw_core::store::prefs_key;
use nudgeclaw_core::traits::{PersistentStore, WorkItemSource};
use nudgeclaw_core::types::{
    NotificationType, ResponseOutcome, ScheduledNotification, SchedulingDecision,
    UserPreferences, UserWorkloadProfile, WorkItemSnapshot,
};
use nudgeclaw_scheduler::SchedulerEngine;

/// What one sweep pass found and did.
#[derive(Debug, Default, Clone)]
pub struct SweepReport {
    pub candidates: usize,
    pub scheduled: usize,
    pub vetoed: usize,
    pub skipped_unassigned: usize,
}

pub struct ReminderService {
    config: NudgeConfig,
    staleness: StalenessAnalyzer,
    deadline: DeadlineAnalyzer,
    workload: WorkloadAnalyzer,
    scorer: UrgencyScorer,
    source: Arc<dyn WorkItemSource>,
    store: Arc<dyn PersistentStore>,
    engine: Arc<Mutex<SchedulerEngine>>,
}

impl ReminderService {
    pub fn new(
        config: &NudgeConfig,
        source: Arc<dyn WorkItemSource>,
        store: Arc<dyn PersistentStore>,
        engine: Arc<Mutex<SchedulerEngine>>,
    ) -> Self {
        Self {
            config: config.clone(),
            staleness: StalenessAnalyzer::new(config.staleness.clone(), config.calendar.clone()),
            deadline: DeadlineAnalyzer::new(config.deadline.clone(), config.calendar.clone()),
            workload: WorkloadAnalyzer::new(config.workload.clone()),
            scorer: UrgencyScorer::new(config.scoring.clone()),
            source,
            store,
            engine,
        }
    }

    /// Analyze one item and run the candidate through the gate chain.
    pub async fn evaluate(
        &self,
        user_id: &str,
        item: &WorkItemSnapshot,
        notification_type: NotificationType,
        now: DateTime<Utc>,
    ) -> Result<SchedulingDecision> {
        let staleness = self.staleness.assess(item, now)?;
        let deadline = self.deadline.assess(item, now);
        let urgency = self.scorer.combine(&item.id, staleness, deadline, now);

        let assigned = self.source.get_assigned_items(user_id).await?;
        let workload = self.workload.assess(user_id, &assigned, now);
        let preferences = self.load_preferences(user_id).await;

        let mut engine = self.engine.lock().await;
        if let Err(e) = engine.persist_workload(&workload).await {
            tracing::warn!("💾 Workload snapshot write failed for {user_id}: {e}");
        }
        Ok(engine
            .decide(
                user_id,
                &item.id,
                notification_type,
                item.priority,
                &urgency,
                &workload,
                &preferences,
                now,
            )
            .await)
    }

    /// Evaluate and, if the gates allow it, enqueue. `Ok(None)` = vetoed.
    pub async fn remind(
        &self,
        user_id: &str,
        item_id: &str,
        notification_type: NotificationType,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledNotification>> {
        let item = self.source.get_item(item_id).await?;
        let decision = self.evaluate(user_id, &item, notification_type, now).await?;
        if !decision.should_schedule {
            return Ok(None);
        }
        let mut engine = self.engine.lock().await;
        match engine.enqueue(&decision, now).await {
            Ok(n) => Ok(Some(n)),
            // another reminder took the last cap slot between the decision
            // and the enqueue; a late veto, not a failure
            Err(NudgeError::Scheduling(reason)) => {
                tracing::debug!("🚫 {item_id} lost its slot before enqueue: {reason}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Batch pass: find stale and near-deadline items across the tracker
    /// and schedule reminders for their assignees. One bad item never
    /// aborts the sweep.
    pub async fn sweep(&self, project: Option<&str>, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        let stale = self
            .source
            .query_stale(self.config.staleness.stale_days, project)
            .await?;
        let near_deadline = self
            .source
            .query_near_deadline(self.config.deadline.high_days, project)
            .await?;

        let mut candidates: Vec<(WorkItemSnapshot, NotificationType)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for item in near_deadline {
            seen.insert(item.id.clone());
            candidates.push((item, NotificationType::DeadlineWarning));
        }
        for item in stale {
            // deadline pressure outranks staleness for the same item
            if seen.contains(&item.id) {
                continue;
            }
            candidates.push((item, NotificationType::StaleReminder));
        }

        for (item, notification_type) in candidates {
            if !item.status.is_open() {
                continue;
            }
            report.candidates += 1;
            let Some(user_id) = item.assignee.clone() else {
                report.skipped_unassigned += 1;
                continue;
            };

            match self.evaluate(&user_id, &item, notification_type, now).await {
                Ok(decision) if decision.should_schedule => {
                    let mut engine = self.engine.lock().await;
                    match engine.enqueue(&decision, now).await {
                        Ok(_) => report.scheduled += 1,
                        Err(e) => {
                            tracing::warn!("⚠️ Enqueue failed for {}: {e}", item.id);
                            report.vetoed += 1;
                        }
                    }
                }
                Ok(_) => report.vetoed += 1,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping {} during sweep: {e}", item.id);
                }
            }
        }

        tracing::info!(
            "🔍 Sweep: {} candidate(s), {} scheduled, {} vetoed, {} unassigned",
            report.candidates,
            report.scheduled,
            report.vetoed,
            report.skipped_unassigned
        );
        Ok(report)
    }

    /// Cancel a pending notification (item closed, user opted out).
    pub async fn cancel(&self, notification_id: &str) -> bool {
        self.engine.lock().await.cancel(notification_id).await
    }

    /// Current queue contents for one user, highest priority first.
    pub async fn queue_for(&self, user_id: &str) -> Vec<ScheduledNotification> {
        self.engine
            .lock()
            .await
            .queue_snapshot(user_id)
            .map(|q| q.items().to_vec())
            .unwrap_or_default()
    }

    /// Feed a user's reaction to a delivered reminder back into the
    /// adaptive timing model.
    pub async fn record_response(
        &self,
        user_id: &str,
        delivered_at: DateTime<Utc>,
        outcome: ResponseOutcome,
    ) {
        self.engine
            .lock()
            .await
            .record_response(user_id, delivered_at, outcome);
    }

    /// Recompute and persist one user's workload profile.
    pub async fn refresh_workload(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UserWorkloadProfile> {
        let assigned = self.source.get_assigned_items(user_id).await?;
        let profile = self.workload.assess(user_id, &assigned, now);
        self.engine.lock().await.persist_workload(&profile).await?;
        Ok(profile)
    }

    async fn load_preferences(&self, user_id: &str) -> UserPreferences {
        match self.store.get(&prefs_key(user_id)).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Corrupt preferences for {user_id}: {e}");
                UserPreferences::default()
            }),
            Ok(None) => UserPreferences::default(),
            Err(e) => {
                tracing::warn!("⚠️ Preferences read failed for {user_id}: {e}");
                UserPreferences::default()
            }
        }
    }
}
