//! NudgeClaw configuration system.
//!
//! One TOML file (~/.nudgeclaw/config.toml) with a section per component.
//! Every field has a serde default so a partial file always loads.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};

use crate::error::{NudgeError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub staleness: StalenessConfig,
    #[serde(default)]
    pub deadline: DeadlineConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl NudgeConfig {
    /// Load config from the default path, falling back to defaults.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NudgeError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| NudgeError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| NudgeError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Default config path (~/.nudgeclaw/config.toml).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nudgeclaw")
            .join("config.toml")
    }

    /// Reject configurations the engines cannot honor.
    pub fn validate(&self) -> Result<()> {
        let s = &self.staleness;
        let ladder = [
            s.fresh_days,
            s.aging_days,
            s.stale_days,
            s.very_stale_days,
            s.abandoned_days,
        ];
        if ladder.windows(2).any(|w| w[0] >= w[1]) {
            return Err(NudgeError::Scheduling(
                "staleness thresholds must be strictly ascending".into(),
            ));
        }
        let d = &self.deadline;
        if !(d.critical_days < d.high_days && d.high_days < d.medium_days) {
            return Err(NudgeError::Scheduling(
                "deadline thresholds must be strictly ascending".into(),
            ));
        }
        let w = &self.workload;
        if w.optimal_items > w.near_capacity_items {
            return Err(NudgeError::Scheduling(
                "workload cutoffs must be ascending".into(),
            ));
        }
        if self.scheduler.backoff_multiplier < 1.0 {
            return Err(NudgeError::Scheduling(
                "backoff multiplier must be >= 1.0".into(),
            ));
        }
        Ok(())
    }
}

/// Shared business calendar: holidays observed by every component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Dates that do not count as business days and suppress delivery.
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

impl CalendarConfig {
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }
}

/// Staleness analyzer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StalenessConfig {
    /// Adjusted-day thresholds, strictly ascending. First `value <= t` wins.
    #[serde(default = "default_fresh_days")]
    pub fresh_days: f64,
    #[serde(default = "default_aging_days")]
    pub aging_days: f64,
    #[serde(default = "default_stale_days")]
    pub stale_days: f64,
    #[serde(default = "default_very_stale_days")]
    pub very_stale_days: f64,
    #[serde(default = "default_abandoned_days")]
    pub abandoned_days: f64,
    /// Per item-type divisor (epics age slower than bugs). Unknown key = 1.0.
    #[serde(default = "default_type_multipliers")]
    pub type_multipliers: HashMap<String, f64>,
    /// Per priority divisor. Unknown key = 1.0.
    #[serde(default = "default_priority_multipliers")]
    pub priority_multipliers: HashMap<String, f64>,
}

fn default_fresh_days() -> f64 {
    2.0
}
fn default_aging_days() -> f64 {
    5.0
}
fn default_stale_days() -> f64 {
    10.0
}
fn default_very_stale_days() -> f64 {
    20.0
}
fn default_abandoned_days() -> f64 {
    45.0
}
fn default_type_multipliers() -> HashMap<String, f64> {
    HashMap::from([
        ("bug".to_string(), 0.8),
        ("incident".to_string(), 0.5),
        ("task".to_string(), 1.0),
        ("story".to_string(), 1.2),
        ("epic".to_string(), 2.0),
    ])
}
fn default_priority_multipliers() -> HashMap<String, f64> {
    HashMap::from([
        ("urgent".to_string(), 0.5),
        ("high".to_string(), 0.75),
        ("medium".to_string(), 1.0),
        ("low".to_string(), 1.5),
    ])
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            fresh_days: default_fresh_days(),
            aging_days: default_aging_days(),
            stale_days: default_stale_days(),
            very_stale_days: default_very_stale_days(),
            abandoned_days: default_abandoned_days(),
            type_multipliers: default_type_multipliers(),
            priority_multipliers: default_priority_multipliers(),
        }
    }
}

/// Deadline analyzer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineConfig {
    /// `days_remaining <= critical_days` => Critical, and so on upward.
    #[serde(default = "default_critical_days")]
    pub critical_days: f64,
    #[serde(default = "default_high_days")]
    pub high_days: f64,
    #[serde(default = "default_medium_days")]
    pub medium_days: f64,
    /// Overdue by more than this many days escalates High -> Critical.
    #[serde(default = "default_grace_days")]
    pub grace_days: f64,
    /// When true, weekends and configured holidays do not count.
    #[serde(default)]
    pub business_days_only: bool,
    /// Implicit service-level deadline per item type, in days from creation.
    #[serde(default = "default_sla_days")]
    pub sla_days: HashMap<String, f64>,
}

fn default_critical_days() -> f64 {
    1.0
}
fn default_high_days() -> f64 {
    3.0
}
fn default_medium_days() -> f64 {
    7.0
}
fn default_grace_days() -> f64 {
    1.0
}
fn default_sla_days() -> HashMap<String, f64> {
    HashMap::from([("incident".to_string(), 2.0)])
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            critical_days: default_critical_days(),
            high_days: default_high_days(),
            medium_days: default_medium_days(),
            grace_days: default_grace_days(),
            business_days_only: false,
            sla_days: default_sla_days(),
        }
    }
}

/// Workload analyzer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Item-count cutoffs: <= optimal is Light, <= near_capacity Moderate,
    /// above that Heavy (Overloaded past 1.5x).
    #[serde(default = "default_optimal_items")]
    pub optimal_items: usize,
    #[serde(default = "default_near_capacity_items")]
    pub near_capacity_items: usize,
    /// Overdue ratio forcing at least Heavy regardless of raw count.
    #[serde(default = "default_overdue_ratio_heavy")]
    pub overdue_ratio_heavy: f64,
    /// Trailing window for the recent-activity score.
    #[serde(default = "default_activity_window_days")]
    pub activity_window_days: i64,
    /// Daily reminder budget per capacity level.
    #[serde(default = "default_daily_budgets")]
    pub daily_budgets: HashMap<String, u32>,
}

fn default_optimal_items() -> usize {
    8
}
fn default_near_capacity_items() -> usize {
    12
}
fn default_overdue_ratio_heavy() -> f64 {
    0.3
}
fn default_activity_window_days() -> i64 {
    7
}
fn default_daily_budgets() -> HashMap<String, u32> {
    HashMap::from([
        ("light".to_string(), 5),
        ("moderate".to_string(), 4),
        ("heavy".to_string(), 2),
        ("overloaded".to_string(), 1),
    ])
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            optimal_items: default_optimal_items(),
            near_capacity_items: default_near_capacity_items(),
            overdue_ratio_heavy: default_overdue_ratio_heavy(),
            activity_window_days: default_activity_window_days(),
            daily_budgets: default_daily_budgets(),
        }
    }
}

/// Weighting between staleness and deadline when blending the combined
/// urgency score. Deliberately a tunable, not a constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_half")]
    pub staleness_weight: f64,
    #[serde(default = "default_half")]
    pub deadline_weight: f64,
}

fn default_half() -> f64 {
    0.5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            staleness_weight: 0.5,
            deadline_weight: 0.5,
        }
    }
}

/// A preferred delivery window with a selection weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimalWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub weight: f64,
}

/// Scheduling decision engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max notifications per user per calendar day (delivered + pending).
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u32,
    /// Max notifications per user per rolling hour.
    #[serde(default = "default_hourly_cap")]
    pub hourly_cap: u32,
    /// Minimum hours between two notifications of the same type to one user.
    #[serde(default = "default_min_interval_hours")]
    pub min_interval_hours: HashMap<String, f64>,
    /// Multiplier applied to the min interval when computing the target
    /// time. Higher priority = shorter wait.
    #[serde(default = "default_delay_multipliers")]
    pub priority_delay_multipliers: HashMap<String, f64>,
    /// Preferred delivery windows per notification type.
    #[serde(default = "default_windows")]
    pub windows: HashMap<String, Vec<OptimalWindow>>,
    /// Retry backoff: now + base * multiplier^attempts.
    #[serde(default = "default_base_delay_minutes")]
    pub base_delay_minutes: i64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Minimum response samples before adaptive suggestions apply.
    #[serde(default = "default_adaptive_min_samples")]
    pub adaptive_min_samples: usize,
}

fn default_daily_cap() -> u32 {
    5
}
fn default_hourly_cap() -> u32 {
    2
}
fn default_min_interval_hours() -> HashMap<String, f64> {
    HashMap::from([
        ("stale_reminder".to_string(), 8.0),
        ("deadline_warning".to_string(), 1.0),
        ("progress_summary".to_string(), 24.0),
        ("team_encouragement".to_string(), 48.0),
    ])
}
fn default_delay_multipliers() -> HashMap<String, f64> {
    HashMap::from([
        ("urgent".to_string(), 0.5),
        ("high".to_string(), 0.75),
        ("medium".to_string(), 1.0),
        ("low".to_string(), 2.0),
    ])
}
fn default_windows() -> HashMap<String, Vec<OptimalWindow>> {
    let working = |s: (u32, u32), e: (u32, u32), w: f64| OptimalWindow {
        start: NaiveTime::from_hms_opt(s.0, s.1, 0).unwrap_or_default(),
        end: NaiveTime::from_hms_opt(e.0, e.1, 0).unwrap_or_default(),
        weight: w,
    };
    HashMap::from([
        (
            "stale_reminder".to_string(),
            vec![working((9, 30), (11, 0), 1.0), working((14, 0), (16, 0), 0.7)],
        ),
        (
            "deadline_warning".to_string(),
            vec![working((9, 0), (17, 0), 1.0)],
        ),
        (
            "progress_summary".to_string(),
            vec![working((16, 0), (17, 30), 1.0)],
        ),
        (
            "team_encouragement".to_string(),
            vec![working((10, 0), (11, 0), 1.0)],
        ),
    ])
}
fn default_base_delay_minutes() -> i64 {
    30
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_attempts() -> u32 {
    3
}
fn default_adaptive_min_samples() -> usize {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily_cap: default_daily_cap(),
            hourly_cap: default_hourly_cap(),
            min_interval_hours: default_min_interval_hours(),
            priority_delay_multipliers: default_delay_multipliers(),
            windows: default_windows(),
            base_delay_minutes: default_base_delay_minutes(),
            backoff_multiplier: default_backoff_multiplier(),
            max_attempts: default_max_attempts(),
            adaptive_min_samples: default_adaptive_min_samples(),
        }
    }
}

/// Pipeline orchestrator + driver tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// A stage not completing within this budget is a stage failure.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
    /// Content below this validator score triggers the single repair pass.
    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: f64,
    /// Ready notifications processed per tick, across all users.
    #[serde(default = "default_max_per_tick")]
    pub max_per_tick: usize,
    /// Driver loop interval.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

fn default_stage_timeout_secs() -> u64 {
    30
}
fn default_min_quality_score() -> f64 {
    0.6
}
fn default_max_per_tick() -> usize {
    10
}
fn default_tick_secs() -> u64 {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout_secs(),
            min_quality_score: default_min_quality_score(),
            max_per_tick: default_max_per_tick(),
            tick_secs: default_tick_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        NudgeConfig::default().validate().expect("defaults must be valid");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: NudgeConfig = toml::from_str(
            r#"
            [scheduler]
            daily_cap = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scheduler.daily_cap, 3);
        assert_eq!(cfg.scheduler.hourly_cap, 2);
        assert_eq!(cfg.staleness.stale_days, 10.0);
    }

    #[test]
    fn conflicting_thresholds_rejected() {
        let mut cfg = NudgeConfig::default();
        cfg.staleness.aging_days = 1.0; // below fresh_days
        assert!(cfg.validate().is_err());

        let mut cfg = NudgeConfig::default();
        cfg.deadline.high_days = 0.5; // below critical_days
        assert!(cfg.validate().is_err());

        let mut cfg = NudgeConfig::default();
        cfg.scheduler.backoff_multiplier = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn holiday_lookup() {
        let cfg = CalendarConfig {
            holidays: vec![NaiveDate::from_ymd_opt(2026, 12, 25).unwrap()],
        };
        assert!(cfg.is_holiday(NaiveDate::from_ymd_opt(2026, 12, 25).unwrap()));
        assert!(!cfg.is_holiday(NaiveDate::from_ymd_opt(2026, 12, 24).unwrap()));
    }
}
