//! Deadline proximity scoring — independent of staleness.
//!
//! A deadline comes from the item's due date, or from an implicit
//! service-level target configured per item type (e.g. incidents must be
//! resolved within two days of creation).

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

use nudgeclaw_core::config::{CalendarConfig, DeadlineConfig};
use nudgeclaw_core::types::{DeadlineAssessment, UrgencyLevel, WorkItemSnapshot};

pub struct DeadlineAnalyzer {
    config: DeadlineConfig,
    calendar: CalendarConfig,
}

impl DeadlineAnalyzer {
    pub fn new(config: DeadlineConfig, calendar: CalendarConfig) -> Self {
        Self { config, calendar }
    }

    /// Score one item at `now`. Never fails: no deadline simply means
    /// `has_deadline = false` and Low urgency.
    pub fn assess(&self, item: &WorkItemSnapshot, now: DateTime<Utc>) -> DeadlineAssessment {
        let Some(deadline) = self.effective_deadline(item) else {
            return DeadlineAssessment {
                has_deadline: false,
                days_remaining: None,
                urgency: UrgencyLevel::Low,
                is_overdue: false,
            };
        };

        let raw_days = (deadline - now).num_seconds() as f64 / 86_400.0;
        let is_overdue = raw_days < 0.0;

        // Business-day counting only narrows an upcoming window; overdue
        // amounts stay in calendar days.
        let days_remaining = if self.config.business_days_only && !is_overdue {
            self.business_days_until(now, deadline)
        } else {
            raw_days
        };

        let urgency = if is_overdue {
            if -raw_days > self.config.grace_days {
                UrgencyLevel::Critical
            } else {
                UrgencyLevel::High
            }
        } else if days_remaining <= self.config.critical_days {
            UrgencyLevel::Critical
        } else if days_remaining <= self.config.high_days {
            UrgencyLevel::High
        } else if days_remaining <= self.config.medium_days {
            UrgencyLevel::Medium
        } else {
            UrgencyLevel::Low
        };

        DeadlineAssessment {
            has_deadline: true,
            days_remaining: Some(days_remaining),
            urgency,
            is_overdue,
        }
    }

    /// Due date when the item carries one, otherwise the per-type SLA
    /// target counted from creation.
    fn effective_deadline(&self, item: &WorkItemSnapshot) -> Option<DateTime<Utc>> {
        if let Some(due) = item.due_date {
            return Some(due);
        }
        self.config
            .sla_days
            .get(item.item_type.key())
            .map(|days| item.created_at + Duration::seconds((days * 86_400.0) as i64))
    }

    /// Count days from `from` to `to`, skipping weekends and configured
    /// holidays. Day-granular walk.
    fn business_days_until(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
        let mut count = 0.0;
        let mut date = from.date_naive();
        let end = to.date_naive();
        while date < end {
            date += Duration::days(1);
            let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
            if !weekend && !self.calendar.is_holiday(date) {
                count += 1.0;
            }
        }
        count
    }
}
