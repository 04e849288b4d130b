//! Per-user rate-limit counters: calendar-day cap, rolling hourly cap, and
//! the last-sent time per notification type.
//!
//! Counters are only read and written by the engine while it holds its own
//! lock, so a boundary check and the matching increment always happen
//! atomically relative to each other.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use nudgeclaw_core::types::NotificationType;

#[derive(Debug, Default)]
struct UserCounters {
    day: Option<NaiveDate>,
    day_count: u32,
    /// Timestamps inside the rolling hour window.
    hour_events: VecDeque<DateTime<Utc>>,
    last_of_type: HashMap<NotificationType, DateTime<Utc>>,
}

impl UserCounters {
    fn roll(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.day != Some(today) {
            self.day = Some(today);
            self.day_count = 0;
        }
        let cutoff = now - Duration::hours(1);
        while self.hour_events.front().is_some_and(|t| *t < cutoff) {
            self.hour_events.pop_front();
        }
    }
}

/// Tracks accepted (pending + delivered) notifications per user.
/// Expiry and cancellation do not decrement — conservative on purpose.
#[derive(Debug, Default)]
pub struct RateLimiter {
    users: HashMap<String, UserCounters>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications counted against today's calendar-day cap.
    pub fn daily_count(&mut self, user_id: &str, now: DateTime<Utc>) -> u32 {
        let c = self.users.entry(user_id.to_string()).or_default();
        c.roll(now);
        c.day_count
    }

    /// Notifications inside the rolling hour ending at `now`.
    pub fn hourly_count(&mut self, user_id: &str, now: DateTime<Utc>) -> u32 {
        let c = self.users.entry(user_id.to_string()).or_default();
        c.roll(now);
        c.hour_events.len() as u32
    }

    /// When the last notification of this type was accepted for this user.
    pub fn last_of_type(
        &self,
        user_id: &str,
        notification_type: NotificationType,
    ) -> Option<DateTime<Utc>> {
        self.users
            .get(user_id)?
            .last_of_type
            .get(&notification_type)
            .copied()
    }

    /// Record an accepted notification against all windows.
    pub fn record(
        &mut self,
        user_id: &str,
        notification_type: NotificationType,
        now: DateTime<Utc>,
    ) {
        let c = self.users.entry(user_id.to_string()).or_default();
        c.roll(now);
        c.day_count += 1;
        c.hour_events.push_back(now);
        c.last_of_type.insert(notification_type, now);
    }

    /// Pre-seed counters (restart recovery, tests).
    pub fn seed(
        &mut self,
        user_id: &str,
        notification_type: NotificationType,
        count: u32,
        at: DateTime<Utc>,
    ) {
        for _ in 0..count {
            self.record(user_id, notification_type, at);
        }
    }
}
