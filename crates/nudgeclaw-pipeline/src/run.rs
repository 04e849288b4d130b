//! Pipeline run records. One record per (notification, attempt); the run
//! id doubles as the idempotency token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four stages a run walks through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scheduling,
    Content,
    Validation,
    Delivery,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Scheduling => "scheduling",
            Stage::Content => "content",
            Stage::Validation => "validation",
            Stage::Delivery => "delivery",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Outcome of one stage within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub ok: bool,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Full record of one pipeline pass over one notification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub notification_id: String,
    pub attempt: u32,
    pub status: RunStatus,
    pub stages: Vec<StageRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Deterministic run id: re-processing the same attempt produces the
    /// same id, which is what makes runs idempotent.
    pub fn id_for(notification_id: &str, attempt: u32) -> String {
        format!("{notification_id}:{attempt}")
    }

    pub fn new(notification_id: &str, attempt: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Self::id_for(notification_id, attempt),
            notification_id: notification_id.to_string(),
            attempt,
            status: RunStatus::Pending,
            stages: Vec::new(),
            started_at: now,
            finished_at: None,
        }
    }

    /// Move a freshly persisted run into Processing before stage one.
    pub fn start(&mut self) {
        self.status = RunStatus::Processing;
    }

    pub fn record_stage(
        &mut self,
        stage: Stage,
        ok: bool,
        detail: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.stages.push(StageRecord {
            stage,
            ok,
            detail,
            recorded_at: now,
        });
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(now);
    }

    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.status = RunStatus::Failed;
        self.finished_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_deterministic_per_attempt() {
        assert_eq!(PipelineRun::id_for("n-1", 0), "n-1:0");
        assert_eq!(PipelineRun::id_for("n-1", 2), "n-1:2");
        assert_ne!(PipelineRun::id_for("n-1", 0), PipelineRun::id_for("n-1", 1));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Processing.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn runs_are_born_pending_then_start_processing() {
        let mut run = PipelineRun::new("n-1", 0, Utc::now());
        assert_eq!(run.status, RunStatus::Pending);
        run.start();
        assert_eq!(run.status, RunStatus::Processing);
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn stages_accumulate_in_order() {
        let now = Utc::now();
        let mut run = PipelineRun::new("n-1", 0, now);
        run.start();
        run.record_stage(Stage::Scheduling, true, None, now);
        run.record_stage(Stage::Content, true, None, now);
        run.record_stage(Stage::Delivery, false, Some("channel down".into()), now);
        run.fail(now);
        assert_eq!(run.stages.len(), 3);
        assert_eq!(run.stages[2].stage, Stage::Delivery);
        assert!(!run.stages[2].ok);
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.finished_at.is_some());
    }
}
