//! Delivery pipeline: the orchestrator that walks a ready notification
//! through content, validation, and delivery, the tick driver that feeds
//! it, the sweep service that finds candidates, and the default
//! content/delivery collaborators.

pub mod content;
pub mod delivery;
pub mod driver;
pub mod orchestrator;
pub mod run;
pub mod service;

#[cfg(test)]
pub(crate) mod testutil;

pub use content::{HeuristicValidator, TemplateGenerator};
pub use delivery::{ConsoleChannel, WebhookChannel};
pub use driver::{spawn_driver, Driver};
pub use orchestrator::PipelineOrchestrator;
pub use run::{PipelineRun, RunStatus, Stage, StageRecord};
pub use service::{ReminderService, SweepReport};
