//! Async reconcilers, one per job domain.
//!
//! Each reconciler owns its domain state inside a
//! [`tokio::sync::watch`] sender. Progress is applied synchronously with
//! `send_if_modified`, so a handler runs to completion before the next
//! frame is read and observers are woken only on real changes. Readers
//! get snapshots through [`watch::Receiver`](tokio::sync::watch::Receiver)
//! and have no mutation path.

pub mod generation;
pub mod remove_bg;
pub mod training;

pub use generation::{GenerationReconciler, PreviewOutcome};
pub use remove_bg::RemoveBgReconciler;
pub use training::TrainingReconciler;
