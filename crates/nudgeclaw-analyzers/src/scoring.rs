//! Blends staleness and deadline assessments into one urgency score.
//!
//! The relative weighting is a config tunable, not a constant — the right
//! balance differs between support and research teams.

use chrono::{DateTime, Utc};

use nudgeclaw_core::config::ScoringConfig;
use nudgeclaw_core::types::{
    DeadlineAssessment, StalenessAssessment, StalenessLevel, UrgencyAssessment, UrgencyLevel,
};

pub struct UrgencyScorer {
    config: ScoringConfig,
}

impl UrgencyScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Combine the two analyzer outputs for one item into a 0..100 score.
    pub fn combine(
        &self,
        item_id: &str,
        staleness: StalenessAssessment,
        deadline: DeadlineAssessment,
        assessed_at: DateTime<Utc>,
    ) -> UrgencyAssessment {
        let sw = self.config.staleness_weight.max(0.0);
        let dw = self.config.deadline_weight.max(0.0);
        let total = sw + dw;

        let combined_score = if total == 0.0 {
            0.0
        } else {
            let st = staleness_points(staleness.level) * staleness.confidence;
            let dl = deadline_points(&deadline);
            ((sw * st + dw * dl) / total).clamp(0.0, 100.0)
        };

        UrgencyAssessment {
            item_id: item_id.to_string(),
            assessed_at,
            staleness,
            deadline,
            combined_score,
        }
    }
}

fn staleness_points(level: StalenessLevel) -> f64 {
    match level {
        StalenessLevel::Fresh => 0.0,
        StalenessLevel::Aging => 25.0,
        StalenessLevel::Stale => 50.0,
        StalenessLevel::VeryStale => 75.0,
        StalenessLevel::Abandoned => 100.0,
    }
}

fn deadline_points(deadline: &DeadlineAssessment) -> f64 {
    if !deadline.has_deadline {
        return 0.0;
    }
    match deadline.urgency {
        UrgencyLevel::Low => 10.0,
        UrgencyLevel::Medium => 40.0,
        UrgencyLevel::High => 70.0,
        UrgencyLevel::Critical => 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staleness(level: StalenessLevel) -> StalenessAssessment {
        StalenessAssessment {
            days_since_update: 10.0,
            adjusted_days: 10.0,
            level,
            confidence: 1.0,
        }
    }

    fn deadline(urgency: UrgencyLevel) -> DeadlineAssessment {
        DeadlineAssessment {
            has_deadline: true,
            days_remaining: Some(1.0),
            urgency,
            is_overdue: false,
        }
    }

    #[test]
    fn equal_weights_average_the_components() {
        let scorer = UrgencyScorer::new(ScoringConfig::default());
        let got = scorer.combine(
            "PROJ-1",
            staleness(StalenessLevel::Stale),
            deadline(UrgencyLevel::Critical),
            Utc::now(),
        );
        assert!((got.combined_score - 75.0).abs() < 1e-9);
    }

    #[test]
    fn weights_shift_the_blend() {
        let scorer = UrgencyScorer::new(ScoringConfig {
            staleness_weight: 1.0,
            deadline_weight: 0.0,
        });
        let got = scorer.combine(
            "PROJ-1",
            staleness(StalenessLevel::Abandoned),
            deadline(UrgencyLevel::Low),
            Utc::now(),
        );
        assert!((got.combined_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn no_deadline_contributes_nothing() {
        let scorer = UrgencyScorer::new(ScoringConfig::default());
        let none = DeadlineAssessment {
            has_deadline: false,
            days_remaining: None,
            urgency: UrgencyLevel::Low,
            is_overdue: false,
        };
        let got = scorer.combine("PROJ-1", staleness(StalenessLevel::Fresh), none, Utc::now());
        assert_eq!(got.combined_score, 0.0);
    }
}
