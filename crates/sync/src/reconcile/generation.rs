//! Generation reconciler: submission, live frame progress, history, and
//! the style "generating" flag.

use std::sync::Arc;

use artforge_core::generation::{
    validate_generation_request, ControlNetPreviewResponse, ControlType, GenerationRequest,
    GenerationState, GenerationTask, GenerationUpdate,
};
use artforge_core::progress::ProgressMessage;
use tokio::sync::watch;

use crate::api::JobApi;
use crate::error::SyncError;
use crate::style::StylePresence;

/// Result of a ControlNet preview request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    Ready(String),
    /// The backend had no preview for this image.
    Unavailable,
    Failed(String),
}

pub struct GenerationReconciler {
    api: Arc<dyn JobApi>,
    styles: Arc<dyn StylePresence>,
    state: watch::Sender<GenerationState>,
}

impl GenerationReconciler {
    pub fn new(api: Arc<dyn JobApi>, styles: Arc<dyn StylePresence>) -> Self {
        let (state, _) = watch::channel(GenerationState::default());
        Self { api, styles, state }
    }

    /// Borrow the current state. Do not hold across an `.await`.
    pub fn state(&self) -> watch::Ref<'_, GenerationState> {
        self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.state.subscribe()
    }

    /// Validate and submit a generation job, then make it the current
    /// task with frame counters reset.
    ///
    /// The style is flagged as generating before the request goes out.
    /// On failure the loading indicator is cleared, the error is recorded,
    /// and the previous current task is left alone. The flag is cleared
    /// too unless that task is still running for the same style.
    pub async fn submit(&self, request: GenerationRequest) -> Result<GenerationTask, SyncError> {
        validate_generation_request(&request)?;

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        if let Some(style_id) = request.style_id {
            self.styles.set_generating(style_id, true);
        }

        let task = match self.api.submit_generation(&request).await {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(error = %e, style_id = ?request.style_id, "Generation submission failed");
                let mut style_still_busy = false;
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                    style_still_busy = s
                        .current
                        .as_ref()
                        .is_some_and(|c| !c.status.is_terminal() && c.style_id == request.style_id);
                });
                // An earlier task for the same style is still running.
                if let Some(style_id) = request.style_id.filter(|_| !style_still_busy) {
                    self.styles.set_generating(style_id, false);
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            task_id = task.id,
            style_id = ?task.style_id,
            batch_size = task.batch_size,
            "Generation task submitted",
        );

        let mut displaced = None;
        self.state.send_modify(|s| {
            displaced = s
                .current
                .as_ref()
                .filter(|c| !c.status.is_terminal() && c.style_id != task.style_id)
                .and_then(|c| c.style_id);
            s.begin(&task);
        });
        // The displaced task is no longer tracked, so nothing else would
        // ever clear its style.
        if let Some(style_id) = displaced {
            self.styles.set_generating(style_id, false);
        }

        Ok(task)
    }

    /// Merge a generation progress message.
    pub fn on_progress(&self, msg: &ProgressMessage) -> GenerationUpdate {
        let mut update = GenerationUpdate::Ignored;
        self.state.send_if_modified(|s| {
            update = s.apply_progress(msg);
            update != GenerationUpdate::Ignored
        });

        match &update {
            GenerationUpdate::Ignored => {
                tracing::debug!(task_id = msg.id, "Ignoring progress for untracked generation task");
            }
            GenerationUpdate::Merged => {
                tracing::debug!(
                    task_id = msg.id,
                    status = %msg.status,
                    current_frame = ?msg.current_frame,
                    frame_progress = ?msg.frame_progress,
                    "Generation progress merged",
                );
            }
            GenerationUpdate::Finished {
                task_id,
                style_id,
                status,
                added_results,
            } => {
                tracing::info!(
                    task_id,
                    style_id = ?style_id,
                    %status,
                    added_results,
                    "Generation task finished",
                );
                if let Some(style_id) = style_id {
                    self.styles.set_generating(*style_id, false);
                }
            }
        }
        update
    }

    /// Ask the backend to preprocess a control image.
    ///
    /// The preview loading flag is always reset, whatever the outcome.
    pub async fn fetch_controlnet_preview(
        &self,
        image: Vec<u8>,
        file_name: &str,
        control_type: ControlType,
    ) -> PreviewOutcome {
        self.state.send_modify(|s| s.controlnet_preview.loading = true);

        let outcome = match self.api.controlnet_preview(image, file_name, control_type).await {
            Ok(ControlNetPreviewResponse {
                preview_url: Some(url),
            }) => PreviewOutcome::Ready(url),
            Ok(_) => PreviewOutcome::Unavailable,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    control_type = control_type.as_str(),
                    "ControlNet preview failed",
                );
                PreviewOutcome::Failed(e.to_string())
            }
        };

        self.state.send_modify(|s| {
            s.controlnet_preview.loading = false;
            s.controlnet_preview.url = match &outcome {
                PreviewOutcome::Ready(url) => Some(url.clone()),
                _ => None,
            };
        });
        outcome
    }

    pub fn clear_controlnet_preview(&self) {
        self.state.send_if_modified(|s| {
            let had_preview = s.controlnet_preview.url.is_some();
            s.controlnet_preview.url = None;
            had_preview
        });
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }
}
