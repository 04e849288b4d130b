//! Workload capacity scoring — how much more nudging can this user absorb.
//!
//! The derived notification budget is the single place workload feeds back
//! into scheduling.

use chrono::{DateTime, Duration, Utc};

use nudgeclaw_core::config::WorkloadConfig;
use nudgeclaw_core::types::{CapacityLevel, UserWorkloadProfile, WorkItemSnapshot};

pub struct WorkloadAnalyzer {
    config: WorkloadConfig,
}

impl WorkloadAnalyzer {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }

    /// Build a workload profile from the user's assigned items.
    pub fn assess(
        &self,
        user_id: &str,
        assigned_items: &[WorkItemSnapshot],
        now: DateTime<Utc>,
    ) -> UserWorkloadProfile {
        let active: Vec<&WorkItemSnapshot> = assigned_items
            .iter()
            .filter(|i| i.status.is_open())
            .collect();
        let active_items = active.len();
        let overdue_items = active
            .iter()
            .filter(|i| i.due_date.is_some_and(|d| d < now))
            .count();

        let capacity = self.capacity_for(active_items, overdue_items);
        let activity_score = self.activity_score(&active, now);

        let daily_budget = self
            .config
            .daily_budgets
            .get(capacity.key())
            .copied()
            .unwrap_or(1);

        UserWorkloadProfile {
            user_id: user_id.to_string(),
            active_items,
            overdue_items,
            activity_score,
            capacity,
            daily_budget,
            weekly_budget: daily_budget * 5,
            assessed_at: now,
        }
    }

    /// Item-count cutoffs, with the overdue ratio able to escalate
    /// independently of raw count.
    fn capacity_for(&self, active: usize, overdue: usize) -> CapacityLevel {
        let c = &self.config;
        let mut capacity = if active <= c.optimal_items {
            CapacityLevel::Light
        } else if active <= c.near_capacity_items {
            CapacityLevel::Moderate
        } else if active <= c.near_capacity_items * 3 / 2 {
            CapacityLevel::Heavy
        } else {
            CapacityLevel::Overloaded
        };

        if active > 0 {
            let overdue_ratio = overdue as f64 / active as f64;
            if overdue_ratio > c.overdue_ratio_heavy && capacity < CapacityLevel::Heavy {
                capacity = CapacityLevel::Heavy;
            }
        }
        capacity
    }

    /// Fraction of active items touched inside the trailing window,
    /// scaled to 0..10.
    fn activity_score(&self, active: &[&WorkItemSnapshot], now: DateTime<Utc>) -> f64 {
        if active.is_empty() {
            return 0.0;
        }
        let cutoff = now - Duration::days(self.config.activity_window_days);
        let recent = active.iter().filter(|i| i.updated_at >= cutoff).count();
        recent as f64 / active.len() as f64 * 10.0
    }
}
