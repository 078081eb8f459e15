//! Training job requests and the active-jobs reducer.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::progress::{ProgressMessage, TaskStatus};
use crate::types::DbId;

/// Dataset directory convention: `datasets/{style_name}`.
pub fn dataset_path_for(style_name: &str) -> String {
    format!("datasets/{style_name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleType {
    Ui,
    Vfx,
}

/// LoRA fine-tuning hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub lora_rank: u32,
    pub learning_rate: f64,
    pub steps: u32,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            lora_rank: 16,
            learning_rate: 0.0001,
            steps: 1000,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(4..=64).contains(&self.lora_rank) {
            return Err(CoreError::Validation(format!(
                "lora_rank must be between 4 and 64, got {}",
                self.lora_rank
            )));
        }
        if !(0.00001..=0.01).contains(&self.learning_rate) {
            return Err(CoreError::Validation(format!(
                "learning_rate must be between 0.00001 and 0.01, got {}",
                self.learning_rate
            )));
        }
        if !(100..=10_000).contains(&self.steps) {
            return Err(CoreError::Validation(format!(
                "steps must be between 100 and 10000, got {}",
                self.steps
            )));
        }
        Ok(())
    }
}

/// Body of `POST /api/training`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub style_name: String,
    pub style_type: StyleType,
    pub dataset_path: String,
    pub params: TrainingParams,
}

impl TrainingRequest {
    /// Request for a new style using the conventional dataset path.
    pub fn new(style_name: impl Into<String>, style_type: StyleType, params: TrainingParams) -> Self {
        let style_name = style_name.into();
        Self {
            dataset_path: dataset_path_for(&style_name),
            style_name,
            style_type,
            params,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.style_name.trim().is_empty() {
            return Err(CoreError::Validation("Style name must not be empty".to_string()));
        }
        self.params.validate()
    }
}

/// Training job record returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingJob {
    pub id: DbId,
    pub style_id: Option<DbId>,
    pub dataset_path: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub output_lora_path: Option<String>,
    pub created_at: String,
}

/// Live progress of one training job.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingJobState {
    pub id: DbId,
    pub status: TaskStatus,
    /// Percentage, 0..100.
    pub progress: f64,
}

impl From<&TrainingJob> for TrainingJobState {
    fn from(job: &TrainingJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            progress: job.progress,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingState {
    /// Newest first.
    pub active_jobs: Vec<TrainingJobState>,
    pub submitting: bool,
    pub error: Option<String>,
}

impl TrainingState {
    /// Start tracking a newly submitted job.
    pub fn track(&mut self, job: &TrainingJob) {
        self.active_jobs.insert(0, TrainingJobState::from(job));
        self.submitting = false;
        self.error = None;
    }

    /// Update the matching job in place. Messages for untracked jobs are
    /// ignored; returns whether a job changed.
    pub fn apply_progress(&mut self, msg: &ProgressMessage) -> bool {
        let Some(job) = self.active_jobs.iter_mut().find(|j| j.id == msg.id) else {
            return false;
        };
        job.status = msg.status;
        if let Some(progress) = msg.progress {
            job.progress = progress.clamp(0.0, 100.0);
        }
        true
    }

    pub fn job(&self, id: DbId) -> Result<&TrainingJobState, CoreError> {
        self.active_jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or(CoreError::NotFound {
                entity: "training_job",
                id,
            })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::progress::TaskKind;

    fn job(id: DbId) -> TrainingJob {
        TrainingJob {
            id,
            style_id: Some(3),
            dataset_path: "datasets/pixel".into(),
            status: TaskStatus::Queued,
            params: serde_json::json!({}),
            progress: 0.0,
            output_lora_path: None,
            created_at: "2025-03-01T10:00:00".into(),
        }
    }

    fn progress(id: DbId, status: TaskStatus, pct: Option<f64>) -> ProgressMessage {
        let mut msg = ProgressMessage::new(TaskKind::Training, id, status);
        msg.progress = pct;
        msg
    }

    #[test]
    fn request_uses_dataset_convention() {
        let req = TrainingRequest::new("pixel-art", StyleType::Ui, TrainingParams::default());
        assert_eq!(req.dataset_path, "datasets/pixel-art");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn params_out_of_range_are_rejected() {
        let mut params = TrainingParams::default();
        params.lora_rank = 128;
        assert!(params.validate().is_err());

        let mut params = TrainingParams::default();
        params.learning_rate = 0.5;
        assert!(params.validate().is_err());

        let mut params = TrainingParams::default();
        params.steps = 50;
        assert!(params.validate().is_err());
    }

    #[test]
    fn blank_style_name_is_rejected() {
        let req = TrainingRequest::new(" ", StyleType::Vfx, TrainingParams::default());
        assert_matches!(req.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn tracked_jobs_are_newest_first() {
        let mut state = TrainingState::default();
        state.track(&job(1));
        state.track(&job(2));
        let ids: Vec<_> = state.active_jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn progress_updates_job_in_place() {
        let mut state = TrainingState::default();
        state.track(&job(1));
        state.track(&job(2));

        assert!(state.apply_progress(&progress(1, TaskStatus::Running, Some(40.0))));

        let updated = state.job(1).unwrap();
        assert_eq!(updated.status, TaskStatus::Running);
        assert_eq!(updated.progress, 40.0);
        assert_eq!(state.job(2).unwrap().status, TaskStatus::Queued);
        assert_eq!(state.active_jobs.len(), 2);
    }

    #[test]
    fn missing_progress_keeps_previous_value() {
        let mut state = TrainingState::default();
        state.track(&job(1));
        state.apply_progress(&progress(1, TaskStatus::Running, Some(55.0)));
        state.apply_progress(&progress(1, TaskStatus::Failed, None));

        let updated = state.job(1).unwrap();
        assert_eq!(updated.status, TaskStatus::Failed);
        assert_eq!(updated.progress, 55.0);
    }

    #[test]
    fn unknown_job_is_not_created() {
        let mut state = TrainingState::default();
        state.track(&job(1));
        assert!(!state.apply_progress(&progress(99, TaskStatus::Running, Some(10.0))));
        assert_eq!(state.active_jobs.len(), 1);
        assert_matches!(state.job(99), Err(CoreError::NotFound { id: 99, .. }));
    }
}
