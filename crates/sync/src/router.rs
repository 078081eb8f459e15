//! Dispatch of decoded progress messages to their reconciler.

use std::sync::Arc;

use artforge_core::progress::{parse_message, ProgressMessage, TaskKind};

use crate::connection::FrameSink;
use crate::error::SyncError;
use crate::reconcile::{GenerationReconciler, RemoveBgReconciler, TrainingReconciler};

/// What the router did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to the reconciler for this kind.
    Dispatched(TaskKind),
    /// Kind not handled by this client.
    Unroutable,
}

/// Routes each message to exactly one reconciler by its `kind`.
///
/// Messages are handled strictly in the order they arrive. Unknown kinds
/// are dropped without touching any state; this keeps older clients
/// working when the backend adds a job domain.
pub struct MessageRouter {
    generation: Arc<GenerationReconciler>,
    training: Arc<TrainingReconciler>,
    remove_bg: Arc<RemoveBgReconciler>,
}

impl MessageRouter {
    pub fn new(
        generation: Arc<GenerationReconciler>,
        training: Arc<TrainingReconciler>,
        remove_bg: Arc<RemoveBgReconciler>,
    ) -> Self {
        Self {
            generation,
            training,
            remove_bg,
        }
    }

    pub fn route(&self, msg: &ProgressMessage) -> RouteOutcome {
        match msg.kind {
            TaskKind::Generation => {
                self.generation.on_progress(msg);
            }
            TaskKind::Training => {
                self.training.on_progress(msg);
            }
            TaskKind::RemoveBg => {
                self.remove_bg.on_progress(msg);
            }
            TaskKind::Unknown => {
                tracing::debug!(task_id = msg.id, "Ignoring progress message of unknown kind");
                return RouteOutcome::Unroutable;
            }
        }
        RouteOutcome::Dispatched(msg.kind)
    }

    /// Decode one text frame and route it.
    pub fn route_frame(&self, text: &str) -> Result<RouteOutcome, SyncError> {
        let msg = parse_message(text)?;
        Ok(self.route(&msg))
    }
}

impl FrameSink for MessageRouter {
    fn on_frame(&self, text: &str) {
        if let Err(e) = self.route_frame(text) {
            tracing::warn!(error = %e, raw_message = %text, "Dropping malformed progress frame");
        }
    }
}
