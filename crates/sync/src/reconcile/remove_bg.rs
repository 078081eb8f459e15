//! Background-removal reconciler.

use std::sync::Arc;

use artforge_core::progress::ProgressMessage;
use artforge_core::remove_bg::{RemoveBgRequest, RemoveBgState, RemoveBgTask, RemoveBgUpdate};
use tokio::sync::watch;

use crate::api::JobApi;
use crate::error::SyncError;

pub struct RemoveBgReconciler {
    api: Arc<dyn JobApi>,
    state: watch::Sender<RemoveBgState>,
}

impl RemoveBgReconciler {
    pub fn new(api: Arc<dyn JobApi>) -> Self {
        let (state, _) = watch::channel(RemoveBgState::default());
        Self { api, state }
    }

    pub fn state(&self) -> watch::Ref<'_, RemoveBgState> {
        self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RemoveBgState> {
        self.state.subscribe()
    }

    /// Submit a background-removal job; the returned task becomes current.
    pub async fn submit(&self, request: RemoveBgRequest) -> Result<RemoveBgTask, SyncError> {
        request.validate()?;

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        match self.api.submit_remove_bg(&request).await {
            Ok(task) => {
                tracing::info!(
                    task_id = task.id,
                    source_task_id = ?task.source_task_id,
                    "Background removal submitted",
                );
                self.state.send_modify(|s| s.begin(&task));
                Ok(task)
            }
            Err(e) => {
                tracing::error!(error = %e, input_image = %request.input_image, "Background removal submission failed");
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
                Err(e.into())
            }
        }
    }

    pub fn on_progress(&self, msg: &ProgressMessage) -> RemoveBgUpdate {
        let mut update = RemoveBgUpdate::Ignored;
        self.state.send_if_modified(|s| {
            update = s.apply_progress(msg);
            update != RemoveBgUpdate::Ignored
        });

        match update {
            RemoveBgUpdate::Ignored => {
                tracing::debug!(task_id = msg.id, "Ignoring progress for untracked remove-bg task");
            }
            RemoveBgUpdate::Merged => {
                tracing::debug!(task_id = msg.id, status = %msg.status, "Remove-bg progress merged");
            }
            RemoveBgUpdate::Completed => {
                tracing::info!(task_id = msg.id, "Background removal completed");
            }
        }
        update
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }
}
