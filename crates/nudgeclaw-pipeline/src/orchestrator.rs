//! The pipeline orchestrator: walks one ready notification through
//! preflight, content, validation, and delivery. A stage failure marks the
//! run failed and hands the notification back to the scheduler's backoff —
//! the orchestrator itself never retries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use nudgeclaw_analyzers::{DeadlineAnalyzer, StalenessAnalyzer, UrgencyScorer};
use nudgeclaw_core::config::NudgeConfig;
use nudgeclaw_core::error::{NudgeError, Result};
use nudgeclaw_core::store::{prefs_key, run_key};
use nudgeclaw_core::traits::{
    ContentGenerator, ContentValidator, DeliveryChannel, PersistentStore, ReminderContext,
    WorkItemSource,
};
use nudgeclaw_core::types::{Content, ScheduledNotification, UserPreferences};
use nudgeclaw_scheduler::SchedulerEngine;

use crate::run::{PipelineRun, RunStatus, Stage};

pub struct PipelineOrchestrator {
    config: nudgeclaw_core::config::PipelineConfig,
    staleness: StalenessAnalyzer,
    deadline: DeadlineAnalyzer,
    scorer: UrgencyScorer,
    source: Arc<dyn WorkItemSource>,
    generator: Arc<dyn ContentGenerator>,
    validator: Arc<dyn ContentValidator>,
    channel: Arc<dyn DeliveryChannel>,
    store: Arc<dyn PersistentStore>,
    engine: Arc<Mutex<SchedulerEngine>>,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &NudgeConfig,
        source: Arc<dyn WorkItemSource>,
        generator: Arc<dyn ContentGenerator>,
        validator: Arc<dyn ContentValidator>,
        channel: Arc<dyn DeliveryChannel>,
        store: Arc<dyn PersistentStore>,
        engine: Arc<Mutex<SchedulerEngine>>,
    ) -> Self {
        Self {
            config: config.pipeline.clone(),
            staleness: StalenessAnalyzer::new(config.staleness.clone(), config.calendar.clone()),
            deadline: DeadlineAnalyzer::new(config.deadline.clone(), config.calendar.clone()),
            scorer: UrgencyScorer::new(config.scoring.clone()),
            source,
            generator,
            validator,
            channel,
            store,
            engine,
        }
    }

    /// Process one ready notification end to end.
    ///
    /// Processing the same (notification, attempt) twice is a no-op: the
    /// first terminal run wins and its status is returned unchanged.
    pub async fn process(
        &self,
        notification: &ScheduledNotification,
        now: DateTime<Utc>,
    ) -> Result<RunStatus> {
        let run_id = PipelineRun::id_for(&notification.id, notification.attempts);
        if let Some(value) = self.store.get(&run_key(&run_id)).await? {
            match serde_json::from_value::<PipelineRun>(value) {
                Ok(existing) if existing.status.is_terminal() => {
                    tracing::debug!("⏭️ Run {run_id} already terminal, skipping");
                    return Ok(existing.status);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("⚠️ Corrupt run record {run_id}: {e}"),
            }
        }

        // the run is visible in the store as Pending before stage one
        let mut run = PipelineRun::new(&notification.id, notification.attempts, now);
        self.persist_run(&run).await?;
        run.start();

        // ── Stage 1: preflight ─────────────────────────────
        // Re-check that the reminder is still warranted. Items close,
        // reassign, and vanish between scheduling and pickup.
        let context = match self
            .bounded(Stage::Scheduling, self.preflight(notification, now))
            .await
        {
            Ok(Some(context)) => {
                run.record_stage(Stage::Scheduling, true, None, now);
                context
            }
            Ok(None) => {
                // No-go: the item no longer needs this reminder. Cancel
                // quietly; the run completes without delivering.
                run.record_stage(
                    Stage::Scheduling,
                    true,
                    Some("no longer warranted".to_string()),
                    now,
                );
                self.engine.lock().await.cancel(&notification.id).await;
                run.complete(now);
                self.persist_run(&run).await?;
                tracing::info!(
                    "⏭️ {} no longer warranted, cancelled without delivery",
                    notification.id
                );
                return Ok(run.status);
            }
            Err(e) => {
                return self.fail_run(run, Stage::Scheduling, e, notification, now).await;
            }
        };

        let preferences = self.load_preferences(&notification.user_id).await;

        // ── Stage 2: content ───────────────────────────────
        let content = match self
            .bounded(Stage::Content, self.generator.generate(&context, &preferences))
            .await
        {
            Ok(content) => {
                run.record_stage(Stage::Content, true, None, now);
                content
            }
            Err(e) => return self.fail_run(run, Stage::Content, e, notification, now).await,
        };

        // ── Stage 3: validation ────────────────────────────
        let content = match self.bounded(Stage::Validation, self.validate(content)).await {
            Ok((content, detail)) => {
                run.record_stage(Stage::Validation, true, detail, now);
                content
            }
            Err(e) => return self.fail_run(run, Stage::Validation, e, notification, now).await,
        };

        // ── Stage 4: delivery ──────────────────────────────
        match self
            .bounded(Stage::Delivery, self.channel.deliver(notification, &content))
            .await
        {
            Ok(delivery) if delivery.delivered => {
                run.record_stage(Stage::Delivery, true, None, now);
                let mut engine = self.engine.lock().await;
                engine.record_delivery(&notification.user_id, &notification.id).await?;
                run.complete(now);
                self.persist_run(&run).await?;
                Ok(run.status)
            }
            Ok(delivery) => {
                let e = NudgeError::Delivery(
                    delivery.error.unwrap_or_else(|| "channel refused".to_string()),
                );
                self.fail_run(run, Stage::Delivery, e, notification, now).await
            }
            Err(e) => self.fail_run(run, Stage::Delivery, e, notification, now).await,
        }
    }

    /// Rebuild the reminder context from live item data. `Ok(None)` means
    /// the reminder is no longer warranted.
    async fn preflight(
        &self,
        notification: &ScheduledNotification,
        now: DateTime<Utc>,
    ) -> Result<Option<ReminderContext>> {
        let item = match self.source.get_item(&notification.item_id).await {
            Ok(item) => item,
            Err(NudgeError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if !item.status.is_open() {
            return Ok(None);
        }
        let staleness = self.staleness.assess(&item, now)?;
        let deadline = self.deadline.assess(&item, now);
        let urgency = self.scorer.combine(&item.id, staleness, deadline, now);
        Ok(Some(ReminderContext {
            user_id: notification.user_id.clone(),
            notification_type: notification.notification_type,
            item,
            urgency,
        }))
    }

    /// Validate, repair at most once, and proceed with whichever version
    /// scored higher. Only a validator *error* fails the stage — low
    /// scores after repair still go out with the best content we have.
    async fn validate(&self, content: Content) -> Result<(Content, Option<String>)> {
        let verdict = self.validator.validate(&content).await?;
        if verdict.acceptable && verdict.score >= self.config.min_quality_score {
            return Ok((content, None));
        }

        let repaired = self.validator.repair(&content, &verdict.suggestions).await?;
        let second = self.validator.validate(&repaired).await?;
        let detail = Some(format!(
            "repaired once: score {:.2} -> {:.2}",
            verdict.score, second.score
        ));
        if second.score >= verdict.score {
            Ok((repaired, detail))
        } else {
            Ok((content, detail))
        }
    }

    async fn fail_run(
        &self,
        mut run: PipelineRun,
        stage: Stage,
        error: NudgeError,
        notification: &ScheduledNotification,
        now: DateTime<Utc>,
    ) -> Result<RunStatus> {
        tracing::warn!("❌ Run {} failed at {stage}: {error}", run.id);
        run.record_stage(stage, false, Some(error.to_string()), now);
        run.fail(now);
        self.persist_run(&run).await?;

        // Hand the notification back to the scheduler's backoff. It may
        // already be gone (cancelled mid-flight) — that is not an error.
        let mut engine = self.engine.lock().await;
        match engine
            .record_failure(&notification.user_id, &notification.id, now)
            .await
        {
            Ok(_) | Err(NudgeError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        Ok(run.status)
    }

    async fn bounded<T>(
        &self,
        stage: Stage,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let budget = StdDuration::from_secs(self.config.stage_timeout_secs);
        match tokio::time::timeout(budget, fut).await {
            Ok(result) => result,
            Err(_) => Err(NudgeError::Pipeline(format!(
                "{stage} stage exceeded {}s budget",
                self.config.stage_timeout_secs
            ))),
        }
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

    async fn persist_run(&self, run: &PipelineRun) -> Result<()> {
        self.store
            .set(&run_key(&run.id), serde_json::to_value(run)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use nudgeclaw_core::store::MemoryStore;
    use nudgeclaw_core::types::{
        DeadlineAssessment, ItemStatus, NotificationType, Priority, StalenessAssessment,
        StalenessLevel, UrgencyAssessment, UrgencyLevel,
    };

    use crate::content::{HeuristicValidator, TemplateGenerator};
    use crate::testutil::{item, CountingChannel, FakeSource};

    struct Fixture {
        source: Arc<FakeSource>,
        store: Arc<MemoryStore>,
        engine: Arc<Mutex<SchedulerEngine>>,
        channel: Arc<CountingChannel>,
        orchestrator: PipelineOrchestrator,
        now: DateTime<Utc>,
    }

    fn noon() -> DateTime<Utc> {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 4)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn fixture() -> Fixture {
        fixture_with(&NudgeConfig::default())
    }

    fn fixture_with(config: &NudgeConfig) -> Fixture {
        let now = noon();
        let source = Arc::new(FakeSource::with_items(vec![item("PROJ-1", "maria", 12, now)]));
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(Mutex::new(SchedulerEngine::new(
            config,
            Arc::clone(&store) as Arc<dyn PersistentStore>,
        )));
        let channel = Arc::new(CountingChannel::new());
        let orchestrator = PipelineOrchestrator::new(
            config,
            Arc::clone(&source) as Arc<dyn WorkItemSource>,
            Arc::new(TemplateGenerator::with_seed(7)),
            Arc::new(HeuristicValidator::new(config.pipeline.min_quality_score)),
            Arc::clone(&channel) as Arc<dyn DeliveryChannel>,
            Arc::clone(&store) as Arc<dyn PersistentStore>,
            Arc::clone(&engine),
        );
        Fixture {
            source,
            store,
            engine,
            channel,
            orchestrator,
            now,
        }
    }

    fn urgency() -> UrgencyAssessment {
        UrgencyAssessment {
            item_id: "PROJ-1".into(),
            assessed_at: noon(),
            staleness: StalenessAssessment {
                days_since_update: 12.0,
                adjusted_days: 12.0,
                level: StalenessLevel::VeryStale,
                confidence: 0.7,
            },
            deadline: DeadlineAssessment {
                has_deadline: false,
                days_remaining: None,
                urgency: UrgencyLevel::Low,
                is_overdue: false,
            },
            combined_score: 40.0,
        }
    }

    async fn schedule_one(fx: &Fixture) -> ScheduledNotification {
        let mut engine = fx.engine.lock().await;
        let prefs = UserPreferences {
            respect_quiet_hours: false,
            ..UserPreferences::default()
        };
        let decision = engine
            .decide(
                "maria",
                "PROJ-1",
                NotificationType::StaleReminder,
                Priority::Medium,
                &urgency(),
                &nudgeclaw_core::types::UserWorkloadProfile::unknown("maria"),
                &prefs,
                fx.now,
            )
            .await;
        assert!(decision.should_schedule);
        engine.enqueue(&decision, fx.now).await.unwrap()
    }

    #[tokio::test]
    async fn happy_path_delivers_and_completes() {
        let fx = fixture();
        let n = schedule_one(&fx).await;
        let at = n.scheduled_for + chrono::Duration::seconds(1);

        let status = fx.orchestrator.process(&n, at).await.unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(fx.channel.call_count(), 1);

        // run record persisted with all four stages ok
        let raw = fx
            .store
            .get(&run_key(&PipelineRun::id_for(&n.id, 0)))
            .await
            .unwrap()
            .unwrap();
        let run: PipelineRun = serde_json::from_value(raw).unwrap();
        assert_eq!(run.stages.len(), 4);
        assert!(run.stages.iter().all(|s| s.ok));

        // delivered notifications leave the queue
        let engine = fx.engine.lock().await;
        assert!(engine.queue_snapshot("maria").unwrap().is_empty());
    }

    #[tokio::test]
    async fn reprocessing_the_same_attempt_is_a_no_op() {
        let fx = fixture();
        let n = schedule_one(&fx).await;
        let at = n.scheduled_for + chrono::Duration::seconds(1);

        let first = fx.orchestrator.process(&n, at).await.unwrap();
        let second = fx.orchestrator.process(&n, at).await.unwrap();
        assert_eq!(first, RunStatus::Completed);
        assert_eq!(second, RunStatus::Completed);
        assert_eq!(fx.channel.call_count(), 1, "one delivery despite two calls");
    }

    #[tokio::test]
    async fn closed_item_cancels_without_delivering() {
        let fx = fixture();
        let n = schedule_one(&fx).await;
        fx.source.set_status("PROJ-1", ItemStatus::Done);

        let at = n.scheduled_for + chrono::Duration::seconds(1);
        let status = fx.orchestrator.process(&n, at).await.unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(fx.channel.call_count(), 0);

        let engine = fx.engine.lock().await;
        assert!(engine.queue_snapshot("maria").unwrap().is_empty());
    }

    #[tokio::test]
    async fn vanished_item_is_a_quiet_no_go() {
        let fx = fixture();
        let n = schedule_one(&fx).await;
        fx.source.remove("PROJ-1");

        let at = n.scheduled_for + chrono::Duration::seconds(1);
        let status = fx.orchestrator.process(&n, at).await.unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(fx.channel.call_count(), 0);
    }

    #[tokio::test]
    async fn delivery_failure_backs_off_without_orchestrator_retry() {
        let fx = fixture();
        let n = schedule_one(&fx).await;
        fx.channel.set_failing(true);

        let at = n.scheduled_for + chrono::Duration::seconds(1);
        let status = fx.orchestrator.process(&n, at).await.unwrap();
        assert_eq!(status, RunStatus::Failed);
        assert_eq!(fx.channel.call_count(), 1, "the orchestrator never retries");

        // the scheduler took it back with backoff applied
        let engine = fx.engine.lock().await;
        let queue = engine.queue_snapshot("maria").unwrap();
        let retry = queue.get(&n.id).unwrap();
        assert_eq!(retry.attempts, 1);
        assert!(retry.scheduled_for > at);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stage_hits_the_timeout_budget() {
        struct SleepyGenerator;

        #[async_trait::async_trait]
        impl ContentGenerator for SleepyGenerator {
            async fn generate(
                &self,
                _context: &ReminderContext,
                _preferences: &UserPreferences,
            ) -> Result<Content> {
                tokio::time::sleep(std::time::Duration::from_secs(600)).await;
                unreachable!("the stage budget fires first")
            }
        }

        let config = NudgeConfig::default();
        let fx = fixture_with(&config);
        let n = schedule_one(&fx).await;

        let orchestrator = PipelineOrchestrator::new(
            &config,
            Arc::clone(&fx.source) as Arc<dyn WorkItemSource>,
            Arc::new(SleepyGenerator),
            Arc::new(HeuristicValidator::new(config.pipeline.min_quality_score)),
            Arc::clone(&fx.channel) as Arc<dyn DeliveryChannel>,
            Arc::clone(&fx.store) as Arc<dyn PersistentStore>,
            Arc::clone(&fx.engine),
        );

        let at = n.scheduled_for + chrono::Duration::seconds(1);
        let status = orchestrator.process(&n, at).await.unwrap();
        assert_eq!(status, RunStatus::Failed);
        assert_eq!(fx.channel.call_count(), 0);
    }

    #[tokio::test]
    async fn poor_content_is_repaired_exactly_once() {
        struct ShoutingGenerator {
            calls: AtomicU64,
        }

        #[async_trait::async_trait]
        impl ContentGenerator for ShoutingGenerator {
            async fn generate(
                &self,
                _context: &ReminderContext,
                _preferences: &UserPreferences,
            ) -> Result<Content> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(Content {
                    title: "UPDATE THIS NOW!!!".into(),
                    body: "Hurry up!!".into(),
                    action_ref: Some("PROJ-1".into()),
                })
            }
        }

        let config = NudgeConfig::default();
        let fx = fixture_with(&config);
        let n = schedule_one(&fx).await;

        let orchestrator = PipelineOrchestrator::new(
            &config,
            Arc::clone(&fx.source) as Arc<dyn WorkItemSource>,
            Arc::new(ShoutingGenerator {
                calls: AtomicU64::new(0),
            }),
            Arc::new(HeuristicValidator::new(config.pipeline.min_quality_score)),
            Arc::clone(&fx.channel) as Arc<dyn DeliveryChannel>,
            Arc::clone(&fx.store) as Arc<dyn PersistentStore>,
            Arc::clone(&fx.engine),
        );

        let at = n.scheduled_for + chrono::Duration::seconds(1);
        let status = orchestrator.process(&n, at).await.unwrap();
        // repaired content goes out; the run records the repair
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(fx.channel.call_count(), 1);

        let raw = fx
            .store
            .get(&run_key(&PipelineRun::id_for(&n.id, 0)))
            .await
            .unwrap()
            .unwrap();
        let run: PipelineRun = serde_json::from_value(raw).unwrap();
        let validation = run
            .stages
            .iter()
            .find(|s| s.stage == Stage::Validation)
            .unwrap();
        assert!(validation.detail.as_deref().unwrap().contains("repaired once"));
    }
}
