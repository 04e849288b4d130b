//! Error taxonomy for the reminder decision core.
//!
//! Gate vetoes are *not* errors — they come back as normal
//! `SchedulingDecision`s with a reasoning trail. Errors here are for broken
//! inputs, broken config, and collaborator failures.

use thiserror::Error;

/// All errors produced by NudgeClaw crates.
#[derive(Debug, Error)]
pub enum NudgeError {
    /// Bad or missing work-item data (e.g. updated_at before created_at).
    #[error("analysis error: {0}")]
    Analysis(String),

    /// Invalid scheduler configuration (e.g. non-ascending thresholds).
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// Content judged unacceptable even after the repair pass.
    #[error("validation error: {0}")]
    Validation(String),

    /// A pipeline stage failed or ran past its time budget.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// External delivery channel failure.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Persistence I/O failure.
    #[error("store error: {0}")]
    Store(String),

    /// The requested entity does not exist (distinct from transient failures).
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient work-item source failure — safe to retry later.
    #[error("source error: {0}")]
    Source(String),

    /// Configuration file problems.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, NudgeError>;
