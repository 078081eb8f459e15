//! Local export of generated images.
//!
//! [`ExportOrchestrator`] saves a single image or bundles several into a
//! zip archive. Bundles fetch every item concurrently and isolate
//! per-item failures: the archive holds whatever could be fetched, and
//! the returned [`BundleReport`] lists what was left out.

pub mod error;
pub mod orchestrator;
pub mod plan;

pub use error::ExportError;
pub use orchestrator::{BundleReport, BundledItem, ExportOrchestrator, ExportOutcome, FailedItem};
pub use plan::DownloadPlan;
