//! Adaptive delivery-hour tuning — bounded heuristics, not learning.
//!
//! Past responses are tallied by hour of day. Once a user has enough
//! samples, the tuner suggests a preferred hour with an impact tier. The
//! suggestion is advisory: it reweights optimal windows and is logged, but
//! never overrides a hard gate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nudgeclaw_core::types::ResponseOutcome;

/// Responses kept per user. Oldest drop first.
const HISTORY_CAP: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub hour: u32,
    pub outcome: ResponseOutcome,
    pub at: DateTime<Utc>,
}

/// How strongly the suggestion should influence window weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveSuggestion {
    pub preferred_hour: u32,
    pub impact: ImpactTier,
    pub sample_count: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct AdaptiveTuner {
    min_samples: usize,
    by_user: HashMap<String, Vec<ResponseRecord>>,
}

impl AdaptiveTuner {
    pub fn new(min_samples: usize) -> Self {
        Self {
            min_samples,
            by_user: HashMap::new(),
        }
    }

    /// Record how a user reacted to a reminder delivered at `hour` (0-23).
    pub fn record(&mut self, user_id: &str, hour: u32, outcome: ResponseOutcome) {
        let records = self.by_user.entry(user_id.to_string()).or_default();
        records.push(ResponseRecord {
            hour: hour % 24,
            outcome,
            at: Utc::now(),
        });
        if records.len() > HISTORY_CAP {
            let excess = records.len() - HISTORY_CAP;
            records.drain(..excess);
        }
    }

    pub fn sample_count(&self, user_id: &str) -> usize {
        self.by_user.get(user_id).map_or(0, Vec::len)
    }

    /// Advisory preferred delivery hour, once `min_samples` is reached.
    pub fn suggest(&self, user_id: &str) -> Option<AdaptiveSuggestion> {
        let records = self.by_user.get(user_id)?;
        if records.len() < self.min_samples {
            return None;
        }

        let mut positives: HashMap<u32, usize> = HashMap::new();
        let mut total_positive = 0usize;
        for r in records {
            if r.outcome.is_positive() {
                *positives.entry(r.hour).or_default() += 1;
                total_positive += 1;
            }
        }
        // Pick the hour with the most positive responses; earlier hour wins
        // a tie so the suggestion is deterministic.
        let (preferred_hour, hits) = positives
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))?;

        let positive_share = total_positive as f64 / records.len() as f64;
        let impact = if positive_share > 0.6 {
            ImpactTier::High
        } else if positive_share > 0.3 {
            ImpactTier::Medium
        } else {
            ImpactTier::Low
        };

        Some(AdaptiveSuggestion {
            preferred_hour,
            impact,
            sample_count: records.len(),
            reason: format!(
                "{hits} of {total_positive} positive responses landed at {preferred_hour:02}:00 \
                 ({:.0}% of all responses positive)",
                positive_share * 100.0
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_suggestion_below_min_samples() {
        let mut tuner = AdaptiveTuner::new(10);
        for _ in 0..9 {
            tuner.record("maria", 10, ResponseOutcome::Actioned);
        }
        assert!(tuner.suggest("maria").is_none());
        tuner.record("maria", 10, ResponseOutcome::Actioned);
        assert!(tuner.suggest("maria").is_some());
    }

    #[test]
    fn preferred_hour_follows_positive_responses() {
        let mut tuner = AdaptiveTuner::new(10);
        for _ in 0..6 {
            tuner.record("maria", 9, ResponseOutcome::Actioned);
        }
        for _ in 0..4 {
            tuner.record("maria", 15, ResponseOutcome::Dismissed);
        }
        let s = tuner.suggest("maria").expect("enough samples");
        assert_eq!(s.preferred_hour, 9);
        assert_eq!(s.sample_count, 10);
        // 6/10 positive => Medium (not strictly > 0.6)
        assert_eq!(s.impact, ImpactTier::Medium);
        assert!(s.reason.contains("09:00"));
    }

    #[test]
    fn mostly_ignored_users_get_low_impact() {
        let mut tuner = AdaptiveTuner::new(10);
        tuner.record("jo", 11, ResponseOutcome::Acknowledged);
        for _ in 0..11 {
            tuner.record("jo", 14, ResponseOutcome::Ignored);
        }
        let s = tuner.suggest("jo").expect("enough samples");
        assert_eq!(s.preferred_hour, 11);
        assert_eq!(s.impact, ImpactTier::Low);
    }

    #[test]
    fn history_is_bounded() {
        let mut tuner = AdaptiveTuner::new(10);
        for _ in 0..(HISTORY_CAP + 50) {
            tuner.record("maria", 9, ResponseOutcome::Ignored);
        }
        assert_eq!(tuner.sample_count("maria"), HISTORY_CAP);
    }
}
