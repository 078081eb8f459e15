//! Training reconciler: tracks every submitted LoRA training job.

use std::sync::Arc;

use artforge_core::progress::ProgressMessage;
use artforge_core::training::{TrainingJob, TrainingJobState, TrainingRequest, TrainingState};
use artforge_core::types::DbId;
use tokio::sync::watch;

use crate::api::JobApi;
use crate::error::SyncError;

pub struct TrainingReconciler {
    api: Arc<dyn JobApi>,
    state: watch::Sender<TrainingState>,
}

impl TrainingReconciler {
    pub fn new(api: Arc<dyn JobApi>) -> Self {
        let (state, _) = watch::channel(TrainingState::default());
        Self { api, state }
    }

    pub fn state(&self) -> watch::Ref<'_, TrainingState> {
        self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrainingState> {
        self.state.subscribe()
    }

    /// Submit a training job and start tracking it at the head of the
    /// active-jobs list.
    pub async fn submit(&self, request: TrainingRequest) -> Result<TrainingJob, SyncError> {
        request.validate()?;

        self.state.send_modify(|s| {
            s.submitting = true;
            s.error = None;
        });

        match self.api.submit_training(&request).await {
            Ok(job) => {
                tracing::info!(
                    job_id = job.id,
                    style_name = %request.style_name,
                    dataset_path = %job.dataset_path,
                    "Training job submitted",
                );
                self.state.send_modify(|s| s.track(&job));
                Ok(job)
            }
            Err(e) => {
                tracing::error!(error = %e, style_name = %request.style_name, "Training submission failed");
                self.state.send_modify(|s| {
                    s.submitting = false;
                    s.error = Some(e.to_string());
                });
                Err(e.into())
            }
        }
    }

    /// Update the matching job in place. Returns whether a tracked job
    /// changed.
    pub fn on_progress(&self, msg: &ProgressMessage) -> bool {
        let changed = self.state.send_if_modified(|s| s.apply_progress(msg));
        if changed {
            tracing::debug!(
                job_id = msg.id,
                status = %msg.status,
                progress = ?msg.progress,
                "Training progress merged",
            );
            if msg.status.is_terminal() {
                tracing::info!(job_id = msg.id, status = %msg.status, "Training job finished");
            }
        } else {
            tracing::debug!(job_id = msg.id, "Ignoring progress for untracked training job");
        }
        changed
    }

    /// Snapshot of one tracked job.
    pub fn job(&self, id: DbId) -> Result<TrainingJobState, SyncError> {
        Ok(self.state.borrow().job(id)?.clone())
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }
}
