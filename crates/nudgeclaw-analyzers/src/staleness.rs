//! Staleness scoring — how long has this item sat without meaningful
//! activity, adjusted for what kind of item it is and who is around it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use nudgeclaw_core::config::{CalendarConfig, StalenessConfig};
use nudgeclaw_core::error::{NudgeError, Result};
use nudgeclaw_core::types::{StalenessAssessment, StalenessLevel, WorkItemSnapshot};

/// Activity-signal day adjustments are bounded to this range.
const ADJUSTMENT_BOUND: f64 = 5.0;

/// Tracker clocks can run slightly ahead of ours; an update timestamp
/// within this slack counts as "just now" rather than malformed.
const FUTURE_SKEW_SLACK_SECS: i64 = 2;

pub struct StalenessAnalyzer {
    config: StalenessConfig,
    calendar: CalendarConfig,
}

impl StalenessAnalyzer {
    pub fn new(config: StalenessConfig, calendar: CalendarConfig) -> Self {
        Self { config, calendar }
    }

    /// Score a single item at `now`.
    ///
    /// An absent assignee is a zero-activity context, not an error; a
    /// timestamp that cannot be real (updated before created, or in the
    /// future) is an `AnalysisError`.
    pub fn assess(
        &self,
        item: &WorkItemSnapshot,
        now: DateTime<Utc>,
    ) -> Result<StalenessAssessment> {
        if item.updated_at < item.created_at {
            return Err(NudgeError::Analysis(format!(
                "item {}: updated_at precedes created_at",
                item.id
            )));
        }
        if item.updated_at > now + Duration::seconds(FUTURE_SKEW_SLACK_SECS) {
            return Err(NudgeError::Analysis(format!(
                "item {}: updated_at is in the future",
                item.id
            )));
        }

        let days_since_update =
            (now - item.updated_at).num_seconds().max(0) as f64 / 86_400.0;

        let type_mult = multiplier(
            &self.config.type_multipliers,
            item.item_type.key(),
            "type",
        );
        let priority_mult = multiplier(
            &self.config.priority_multipliers,
            item.priority.key(),
            "priority",
        );

        let adjustment = self.activity_adjustment(item);
        let adjusted_days =
            (days_since_update / (type_mult * priority_mult) + adjustment).max(0.0);

        let level = self.level_for(adjusted_days);
        let confidence = self.confidence(item, now);

        Ok(StalenessAssessment {
            days_since_update,
            adjusted_days,
            level,
            confidence,
        })
    }

    /// Score many items; individually-malformed items are logged and
    /// skipped, never aborting the batch. The returned map may therefore
    /// be smaller than the input.
    pub fn assess_batch(
        &self,
        items: &[WorkItemSnapshot],
        now: DateTime<Utc>,
    ) -> HashMap<String, StalenessAssessment> {
        let mut out = HashMap::with_capacity(items.len());
        for item in items {
            match self.assess(item, now) {
                Ok(assessment) => {
                    out.insert(item.id.clone(), assessment);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Skipping item {} in staleness batch: {e}", item.id);
                }
            }
        }
        out
    }

    /// Bounded day adjustment from recent-activity signals.
    fn activity_adjustment(&self, item: &WorkItemSnapshot) -> f64 {
        let s = &item.signals;
        let mut adj: f64 = 0.0;
        if s.recent_comment {
            adj -= 2.0;
        }
        if s.recent_worklog {
            adj -= 3.0;
        }
        if s.recent_status_change {
            adj -= 1.0;
        }
        if s.assignee_active == Some(true) {
            adj -= 1.0;
        }
        if s.project_active == Some(false) {
            adj += 1.0;
        }
        adj.clamp(-ADJUSTMENT_BOUND, ADJUSTMENT_BOUND)
    }

    /// First ascending threshold the value is <= wins; past the last,
    /// the item is abandoned.
    fn level_for(&self, adjusted_days: f64) -> StalenessLevel {
        let c = &self.config;
        let ladder = [
            (c.fresh_days, StalenessLevel::Fresh),
            (c.aging_days, StalenessLevel::Aging),
            (c.stale_days, StalenessLevel::Stale),
            (c.very_stale_days, StalenessLevel::VeryStale),
            (c.abandoned_days, StalenessLevel::Abandoned),
        ];
        for (threshold, level) in ladder {
            if adjusted_days <= threshold {
                return level;
            }
        }
        StalenessLevel::Abandoned
    }

    fn confidence(&self, item: &WorkItemSnapshot, now: DateTime<Utc>) -> f64 {
        let s = &item.signals;
        let mut confidence: f64 = 0.5;
        if s.recent_comment || s.recent_worklog || s.recent_status_change {
            confidence += 0.2;
        }
        if (now - item.created_at).num_days() > 30 {
            confidence += 0.1;
        }
        if s.assignee_active.is_some() {
            confidence += 0.2;
        }
        if self.calendar.is_holiday(now.date_naive()) {
            confidence -= 0.1;
        }
        confidence.clamp(0.1, 1.0)
    }
}

fn multiplier(table: &HashMap<String, f64>, key: &str, kind: &str) -> f64 {
    match table.get(key) {
        Some(m) => *m,
        None => {
            tracing::debug!("No {kind} multiplier for '{key}', falling back to 1.0");
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nudgeclaw_core::types::{ActivitySignals, ItemStatus, ItemType, Priority};

    fn item(updated_days_ago: i64, now: DateTime<Utc>) -> WorkItemSnapshot {
        WorkItemSnapshot {
            id: "PROJ-1".into(),
            item_type: ItemType::Task,
            priority: Priority::Medium,
            status: ItemStatus::Open,
            created_at: now - Duration::days(updated_days_ago + 5),
            updated_at: now - Duration::days(updated_days_ago),
            due_date: None,
            assignee: None,
            project: "PROJ".into(),
            signals: ActivitySignals::default(),
        }
    }

    fn analyzer() -> StalenessAnalyzer {
        StalenessAnalyzer::new(StalenessConfig::default(), CalendarConfig::default())
    }

    #[test]
    fn ten_days_on_the_boundary_is_stale() {
        // thresholds: fresh 2, aging 5, stale 10, very_stale 20, abandoned 45
        let a = analyzer();
        let now = Utc::now();
        let got = a.assess(&item(10, now), now).unwrap();
        assert_eq!(got.level, StalenessLevel::Stale);
        assert!(got.confidence >= 0.5 && got.confidence <= 0.6);
    }

    #[test]
    fn level_never_decreases_with_more_days() {
        let a = analyzer();
        let now = Utc::now();
        let mut last = StalenessLevel::Fresh;
        for days in [0, 1, 3, 7, 12, 25, 44, 46, 120] {
            let level = a.assess(&item(days, now), now).unwrap().level;
            assert!(level >= last, "level regressed at {days} days");
            last = level;
        }
        assert_eq!(last, StalenessLevel::Abandoned);
    }

    #[test]
    fn activity_signals_pull_the_level_down() {
        let a = analyzer();
        let now = Utc::now();
        let mut it = item(4, now);
        assert_eq!(a.assess(&it, now).unwrap().level, StalenessLevel::Aging);
        // comment (-2) + worklog (-3) pull 4 adjusted days to 0 => fresh
        it.signals.recent_comment = true;
        it.signals.recent_worklog = true;
        assert_eq!(a.assess(&it, now).unwrap().level, StalenessLevel::Fresh);
    }

    #[test]
    fn adjustment_is_bounded() {
        let a = analyzer();
        let now = Utc::now();
        let it = {
            let mut it = item(0, now);
            it.signals = ActivitySignals {
                recent_comment: true,
                recent_worklog: true,
                recent_status_change: true,
                assignee_active: Some(true),
                project_active: Some(true),
            };
            it
        };
        // -7 raw, clamped to -5, then floored at 0 adjusted days
        let got = a.assess(&it, now).unwrap();
        assert_eq!(got.adjusted_days, 0.0);
    }

    #[test]
    fn confidence_stays_in_bounds() {
        let a = analyzer();
        let now = Utc::now();
        let mut it = item(40, now);
        it.signals.recent_comment = true;
        it.signals.assignee_active = Some(false);
        // 0.5 + 0.2 + 0.1 + 0.2 = 1.0, must not exceed
        let got = a.assess(&it, now).unwrap();
        assert!(got.confidence >= 0.1 && got.confidence <= 1.0);
        assert!((got.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn assess_is_idempotent() {
        let a = analyzer();
        let now = Utc::now();
        let it = item(12, now);
        let first = a.assess(&it, now).unwrap();
        let second = a.assess(&it, now).unwrap();
        assert_eq!(first.level, second.level);
        assert_eq!(first.adjusted_days, second.adjusted_days);
        assert_eq!(first.confidence, second.confidence);
    }

    #[test]
    fn future_update_is_an_analysis_error() {
        let a = analyzer();
        let now = Utc::now();
        let mut it = item(0, now);
        it.updated_at = now + Duration::days(1);
        assert!(matches!(a.assess(&it, now), Err(NudgeError::Analysis(_))));
    }

    #[test]
    fn just_updated_item_tolerates_small_clock_skew() {
        // a tracker clock a second ahead must not poison every fresh item
        let a = analyzer();
        let now = Utc::now();
        let mut it = item(0, now);
        it.updated_at = now + Duration::seconds(1);
        let got = a.assess(&it, now).unwrap();
        assert_eq!(got.level, StalenessLevel::Fresh);
        assert_eq!(got.days_since_update, 0.0);
    }

    #[test]
    fn batch_skips_malformed_items() {
        let a = analyzer();
        let now = Utc::now();
        let good = item(3, now);
        let mut bad = item(3, now);
        bad.id = "PROJ-2".into();
        bad.updated_at = bad.created_at - Duration::days(1);
        let out = a.assess_batch(&[good, bad], now);
        assert_eq!(out.len(), 1);
        assert!(out.contains_key("PROJ-1"));
    }
}
