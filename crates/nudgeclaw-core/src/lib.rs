//! # NudgeClaw Core
//!
//! Canonical data model, configuration, error taxonomy, and collaborator
//! traits for the reminder decision core. Every other crate depends on this
//! one and nothing else in the workspace.

pub mod config;
pub mod error;
pub mod store;
pub mod traits;
pub mod types;

pub use config::NudgeConfig;
pub use error::{NudgeError, Result};
pub use store::MemoryStore;
pub use traits::{
    ContentGenerator, ContentValidator, DeliveryChannel, PersistentStore, ReminderContext,
    WorkItemSource,
};
pub use types::{
    ActivitySignals, CapacityLevel, Content, Delivery, ItemStatus, ItemType,
    NotificationStatus, NotificationType, Priority, ResponseOutcome, ScheduledNotification,
    SchedulingDecision, StalenessLevel, UrgencyAssessment, UrgencyLevel, UserPreferences,
    UserWorkloadProfile, Verdict, WorkItemSnapshot,
};
