//! Scheduling core: the gate chain that decides whether a reminder gets
//! sent, per-user priority queues with retry backoff, rate limiting across
//! daily and hourly windows, and the adaptive timing tuner.

pub mod adaptive;
pub mod decision;
pub mod engine;
pub mod limits;
pub mod persistence;
pub mod queue;

pub use adaptive::{AdaptiveSuggestion, AdaptiveTuner, ImpactTier};
pub use decision::{CandidateContext, DecisionEngine, GateCounters};
pub use engine::SchedulerEngine;
pub use limits::RateLimiter;
pub use persistence::SqliteStore;
pub use queue::NotificationQueue;
