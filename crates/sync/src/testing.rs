//! In-memory doubles for the REST boundary and the style capability.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use artforge_core::generation::{
    ControlNetPreviewResponse, ControlType, GenerationRequest, GenerationTask,
};
use artforge_core::progress::TaskStatus;
use artforge_core::remove_bg::{RemoveBgRequest, RemoveBgTask};
use artforge_core::training::{TrainingJob, TrainingRequest};
use artforge_core::types::DbId;
use async_trait::async_trait;

use crate::api::{ApiError, JobApi};
use crate::style::StylePresence;

/// Backend double: echoes requests back as queued records with
/// sequential ids, or fails every call.
pub struct FakeApi {
    pub fail: bool,
    pub preview_url: Option<String>,
    next_id: AtomicI64,
}

impl FakeApi {
    pub fn new(first_id: DbId) -> Self {
        Self {
            fail: false,
            preview_url: None,
            next_id: AtomicI64::new(first_id),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(1)
        }
    }

    fn next(&self) -> Result<DbId, ApiError> {
        if self.fail {
            return Err(ApiError::Status {
                status: 503,
                message: "GPU worker unavailable".to_string(),
            });
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl JobApi for FakeApi {
    async fn submit_generation(&self, request: &GenerationRequest) -> Result<GenerationTask, ApiError> {
        Ok(GenerationTask {
            id: self.next()?,
            style_id: request.style_id,
            generation_type: request.generation_type,
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            input_image: request.input_image.clone(),
            seed: request.seed,
            batch_size: request.batch_size,
            status: TaskStatus::Queued,
            output_paths: vec![],
            created_at: "2025-03-01T10:00:00".to_string(),
        })
    }

    async fn controlnet_preview(
        &self,
        _image: Vec<u8>,
        _file_name: &str,
        _control_type: ControlType,
    ) -> Result<ControlNetPreviewResponse, ApiError> {
        self.next()?;
        Ok(ControlNetPreviewResponse {
            preview_url: self.preview_url.clone(),
        })
    }

    async fn submit_training(&self, request: &TrainingRequest) -> Result<TrainingJob, ApiError> {
        Ok(TrainingJob {
            id: self.next()?,
            style_id: None,
            dataset_path: request.dataset_path.clone(),
            status: TaskStatus::Queued,
            params: serde_json::to_value(&request.params).unwrap_or_default(),
            progress: 0.0,
            output_lora_path: None,
            created_at: "2025-03-01T10:00:00".to_string(),
        })
    }

    async fn submit_remove_bg(&self, request: &RemoveBgRequest) -> Result<RemoveBgTask, ApiError> {
        Ok(RemoveBgTask {
            id: self.next()?,
            input_image: request.input_image.clone(),
            output_image: None,
            model: request.model,
            status: TaskStatus::Queued,
            source_task_id: request.source_task_id,
            created_at: "2025-03-01T10:00:00".to_string(),
        })
    }
}

/// Records every `set_generating` call in order.
#[derive(Default)]
pub struct RecordingStyles {
    calls: Mutex<Vec<(DbId, bool)>>,
}

impl RecordingStyles {
    pub fn calls(&self) -> Vec<(DbId, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl StylePresence for RecordingStyles {
    fn set_generating(&self, style_id: DbId, generating: bool) {
        self.calls.lock().unwrap().push((style_id, generating));
    }
}
