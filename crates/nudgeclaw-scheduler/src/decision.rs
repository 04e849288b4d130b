//! The scheduling decision: should this reminder go out, and when.
//!
//! Gates run in a fixed order and each may veto with a reason. Vetoes are
//! normal decisions, not errors — the reasoning trail records every gate
//! consulted, pass or fail.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};

use nudgeclaw_core::config::{CalendarConfig, OptimalWindow, SchedulerConfig};
use nudgeclaw_core::types::{
    CapacityLevel, NotificationType, Priority, SchedulingDecision, UrgencyAssessment,
    UserPreferences, UserWorkloadProfile,
};

/// Everything known about one reminder candidate.
pub struct CandidateContext<'a> {
    pub user_id: &'a str,
    pub item_id: &'a str,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub urgency: &'a UrgencyAssessment,
    pub workload: &'a UserWorkloadProfile,
    pub preferences: &'a UserPreferences,
}

/// Counter snapshot the engine reads (under its own lock) before deciding.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateCounters {
    pub daily_count: u32,
    pub hourly_count: u32,
    pub last_of_type: Option<DateTime<Utc>>,
    /// A live notification already exists for this (user, item, type).
    pub duplicate_live: bool,
}

/// Advisory weight bonus for windows covering the adaptive preferred hour.
const ADAPTIVE_WINDOW_BONUS: f64 = 0.25;

pub struct DecisionEngine {
    config: SchedulerConfig,
    calendar: CalendarConfig,
}

impl DecisionEngine {
    pub fn new(config: SchedulerConfig, calendar: CalendarConfig) -> Self {
        Self { config, calendar }
    }

    /// Run the gate chain and, if nothing vetoes, compute the target time.
    ///
    /// `adaptive_hour` is the advisory preferred delivery hour from past
    /// responses — it only reweights optimal windows, never bypasses a gate.
    pub fn decide(
        &self,
        ctx: &CandidateContext<'_>,
        counters: &GateCounters,
        adaptive_hour: Option<u32>,
        now: DateTime<Utc>,
    ) -> SchedulingDecision {
        let mut reasoning = Vec::new();
        let mut confidence =
            (0.5 + ctx.urgency.combined_score / 200.0).clamp(0.5, 1.0);

        let veto = |reasoning: Vec<String>, confidence: f64| SchedulingDecision {
            should_schedule: false,
            scheduled_for: None,
            user_id: ctx.user_id.to_string(),
            item_id: ctx.item_id.to_string(),
            notification_type: ctx.notification_type,
            priority: ctx.priority,
            reasoning,
            alternatives: Vec::new(),
            confidence,
        };

        // Invariant guard: never a second live reminder for the same
        // (user, item, type).
        if counters.duplicate_live {
            reasoning.push(format!(
                "duplicate: a live {} notification already exists for {}",
                ctx.notification_type, ctx.item_id
            ));
            return veto(reasoning, 0.0);
        }

        // Gate 1: global daily/hourly caps, tightened by the workload budget.
        let daily_cap = self.config.daily_cap.min(ctx.workload.daily_budget);
        if counters.daily_count >= daily_cap {
            reasoning.push(format!(
                "daily cap reached ({}/{daily_cap})",
                counters.daily_count
            ));
            return veto(reasoning, 0.0);
        }
        if counters.hourly_count >= self.config.hourly_cap {
            reasoning.push(format!(
                "hourly cap reached ({}/{})",
                counters.hourly_count, self.config.hourly_cap
            ));
            return veto(reasoning, 0.0);
        }
        reasoning.push(format!(
            "caps ok (day {}/{daily_cap}, hour {}/{})",
            counters.daily_count, counters.hourly_count, self.config.hourly_cap
        ));

        // Gate 2: workload. Soft — urgent items still pass.
        if ctx.workload.capacity == CapacityLevel::Overloaded {
            if ctx.priority < Priority::Urgent {
                confidence *= 0.3;
                reasoning.push(format!(
                    "workload: user overloaded ({} active items), {} priority deferred",
                    ctx.workload.active_items,
                    ctx.priority.key()
                ));
                return veto(reasoning, confidence);
            }
            confidence *= 0.8;
            reasoning.push("workload: user overloaded, urgent priority passes".into());
        } else {
            reasoning.push(format!("workload ok ({})", ctx.workload.capacity.key()));
        }

        // Gate 3: quiet hours, weekends, holidays — in the user's wall clock.
        let prefs = ctx.preferences;
        let local_now = now + Duration::minutes(prefs.utc_offset_minutes as i64);
        if prefs.respect_quiet_hours
            && in_window(local_now.time(), prefs.quiet_start, prefs.quiet_end)
        {
            confidence *= 0.2;
            reasoning.push(format!(
                "quiet hours ({}-{}) active at local {}",
                prefs.quiet_start.format("%H:%M"),
                prefs.quiet_end.format("%H:%M"),
                local_now.format("%H:%M")
            ));
            return veto(reasoning, confidence);
        }
        if prefs.skip_weekends
            && matches!(local_now.weekday(), Weekday::Sat | Weekday::Sun)
        {
            confidence *= 0.2;
            reasoning.push("weekend: delivery suppressed by preference".into());
            return veto(reasoning, confidence);
        }
        if self.calendar.is_holiday(local_now.date_naive()) {
            confidence *= 0.2;
            reasoning.push(format!("holiday: {}", local_now.date_naive()));
            return veto(reasoning, confidence);
        }
        reasoning.push("quiet-hours gate passed".into());

        // Gate 4: minimum inter-notification interval per type.
        let min_interval = self.min_interval(ctx.notification_type);
        if let Some(last) = counters.last_of_type {
            let since = now - last;
            if since < min_interval {
                reasoning.push(format!(
                    "too soon: last {} was {}min ago (min interval {}min)",
                    ctx.notification_type,
                    since.num_minutes(),
                    min_interval.num_minutes()
                ));
                return veto(reasoning, confidence * 0.5);
            }
        }
        reasoning.push("interval gate passed".into());

        // Target time: min interval scaled by priority, snapped forward to
        // the best optimal window.
        let delay_mult = self
            .config
            .priority_delay_multipliers
            .get(ctx.priority.key())
            .copied()
            .unwrap_or(1.0);
        let earliest_secs = (min_interval.num_seconds() as f64 * delay_mult) as i64;
        let earliest = now + Duration::seconds(earliest_secs);

        let target = match self.snap_to_window(
            ctx.notification_type,
            earliest,
            prefs.utc_offset_minutes,
            adaptive_hour,
            &mut reasoning,
        ) {
            Some(window_start) => window_start,
            None => self.defer_out_of_quiet(earliest, prefs, &mut reasoning),
        };

        reasoning.push(format!("scheduled for {}", target.to_rfc3339()));

        SchedulingDecision {
            should_schedule: true,
            scheduled_for: Some(target),
            user_id: ctx.user_id.to_string(),
            item_id: ctx.item_id.to_string(),
            notification_type: ctx.notification_type,
            priority: ctx.priority,
            reasoning,
            alternatives: (1..=3).map(|i| target + Duration::hours(2 * i)).collect(),
            confidence,
        }
    }

    fn min_interval(&self, notification_type: NotificationType) -> Duration {
        let hours = self
            .config
            .min_interval_hours
            .get(notification_type.key())
            .copied()
            .unwrap_or(4.0);
        Duration::seconds((hours * 3600.0) as i64)
    }

    /// Pick the highest-weight configured window starting at or after
    /// `earliest` (looking up to three days out), in the user's wall clock.
    fn snap_to_window(
        &self,
        notification_type: NotificationType,
        earliest: DateTime<Utc>,
        utc_offset_minutes: i32,
        adaptive_hour: Option<u32>,
        reasoning: &mut Vec<String>,
    ) -> Option<DateTime<Utc>> {
        let windows = self.config.windows.get(notification_type.key())?;
        if windows.is_empty() {
            return None;
        }
        let offset = Duration::minutes(utc_offset_minutes as i64);
        let local_earliest = earliest + offset;

        let mut best: Option<(f64, DateTime<Utc>)> = None;
        for day in 0..3 {
            let date = local_earliest.date_naive() + Duration::days(day);
            for window in windows {
                let Some(local_start) = date.and_time(window.start).and_local_timezone(Utc).single()
                else {
                    continue;
                };
                let start_utc = local_start - offset;
                if start_utc < earliest {
                    continue;
                }
                let weight = effective_weight(window, adaptive_hour);
                let better = match best {
                    None => true,
                    Some((best_weight, best_start)) => {
                        weight > best_weight
                            || (weight == best_weight && start_utc < best_start)
                    }
                };
                if better {
                    best = Some((weight, start_utc));
                }
            }
        }

        let (weight, start) = best?;
        if adaptive_hour.is_some() {
            reasoning.push(format!(
                "window snap: weight {weight:.2} (adaptive hour {:?} considered)",
                adaptive_hour
            ));
        } else {
            reasoning.push(format!("window snap: weight {weight:.2}"));
        }
        Some(start)
    }

    /// No window configured: keep the computed time, but push it past the
    /// quiet window if it would land inside one.
    fn defer_out_of_quiet(
        &self,
        target: DateTime<Utc>,
        prefs: &UserPreferences,
        reasoning: &mut Vec<String>,
    ) -> DateTime<Utc> {
        if !prefs.respect_quiet_hours {
            return target;
        }
        let offset = Duration::minutes(prefs.utc_offset_minutes as i64);
        let local = target + offset;
        if !in_window(local.time(), prefs.quiet_start, prefs.quiet_end) {
            return target;
        }
        // Quiet end is either later today or tomorrow morning.
        let mut local_end = local.date_naive().and_time(prefs.quiet_end);
        if local_end <= local.naive_utc() {
            local_end += Duration::days(1);
        }
        reasoning.push("target deferred past quiet hours".into());
        local_end.and_utc() - offset
    }
}

/// Wall-clock window membership; the window may wrap midnight.
fn in_window(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        t >= start && t < end
    } else {
        t >= start || t < end
    }
}

fn effective_weight(window: &OptimalWindow, adaptive_hour: Option<u32>) -> f64 {
    let mut weight = window.weight;
    if let Some(hour) = adaptive_hour {
        if window.start.hour() <= hour && hour < window.end.hour().max(window.start.hour() + 1) {
            weight += ADAPTIVE_WINDOW_BONUS;
        }
    }
    weight
}
