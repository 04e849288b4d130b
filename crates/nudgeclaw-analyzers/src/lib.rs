//! # NudgeClaw Analyzers
//!
//! The urgency-scoring side of the decision core: staleness, deadline
//! proximity, workload capacity, and the combined urgency score. All pure
//! and synchronous — I/O stays with the collaborators.

pub mod deadline;
pub mod scoring;
pub mod staleness;
pub mod workload;

pub use deadline::DeadlineAnalyzer;
pub use scoring::UrgencyScorer;
pub use staleness::StalenessAnalyzer;
pub use workload::WorkloadAnalyzer;
