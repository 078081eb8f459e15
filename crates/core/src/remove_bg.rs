//! Background-removal requests and the current-task reducer.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::progress::{ProgressMessage, TaskStatus};
use crate::types::DbId;

/// Segmentation model used for background removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveBgModel {
    #[default]
    #[serde(rename = "birefnet")]
    Birefnet,
    #[serde(rename = "birefnet-hr")]
    BirefnetHr,
}

/// Body of `POST /api/remove-bg`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveBgRequest {
    pub input_image: String,
    pub model: RemoveBgModel,
    /// Generation task the input image came from, if any.
    pub source_task_id: Option<DbId>,
}

impl RemoveBgRequest {
    pub fn new(input_image: impl Into<String>) -> Self {
        Self {
            input_image: input_image.into(),
            model: RemoveBgModel::default(),
            source_task_id: None,
        }
    }

    pub fn from_generation(input_image: impl Into<String>, source_task_id: DbId) -> Self {
        Self {
            source_task_id: Some(source_task_id),
            ..Self::new(input_image)
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.input_image.trim().is_empty() {
            return Err(CoreError::Validation(
                "An input image is required for background removal".to_string(),
            ));
        }
        Ok(())
    }
}

/// Background-removal task record returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveBgTask {
    pub id: DbId,
    pub input_image: String,
    #[serde(default)]
    pub output_image: Option<String>,
    #[serde(default)]
    pub model: RemoveBgModel,
    pub status: TaskStatus,
    #[serde(default)]
    pub source_task_id: Option<DbId>,
    pub created_at: String,
}

/// Live view of a background-removal task.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveBgTaskState {
    pub id: DbId,
    pub status: TaskStatus,
    pub output_image: Option<String>,
}

impl From<&RemoveBgTask> for RemoveBgTaskState {
    fn from(task: &RemoveBgTask) -> Self {
        Self {
            id: task.id,
            status: task.status,
            output_image: task.output_image.clone(),
        }
    }
}

/// What applying a progress message did to the remove-bg state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveBgUpdate {
    Ignored,
    Merged,
    /// The current task completed and a snapshot was added to results.
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveBgState {
    pub current: Option<RemoveBgTaskState>,
    /// Completed tasks, newest first. Snapshots taken at completion.
    pub results: Vec<RemoveBgTaskState>,
    pub loading: bool,
    pub error: Option<String>,
}

impl RemoveBgState {
    pub fn begin(&mut self, task: &RemoveBgTask) {
        self.current = Some(RemoveBgTaskState::from(task));
        self.loading = false;
        self.error = None;
    }

    /// Merge progress into the current task; on the transition to
    /// `completed` prepend a copy of it to `results`. A repeated
    /// `completed` message only merges.
    pub fn apply_progress(&mut self, msg: &ProgressMessage) -> RemoveBgUpdate {
        let Some(current) = self.current.as_mut().filter(|c| c.id == msg.id) else {
            return RemoveBgUpdate::Ignored;
        };

        let was_completed = current.status == TaskStatus::Completed;
        current.status = msg.status;
        if let Some(first) = msg.output_paths.as_ref().and_then(|p| p.first()) {
            current.output_image = Some(first.clone());
        }

        if msg.status == TaskStatus::Completed && !was_completed {
            let snapshot = current.clone();
            self.results.insert(0, snapshot);
            RemoveBgUpdate::Completed
        } else {
            RemoveBgUpdate::Merged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::TaskKind;

    fn task(id: DbId) -> RemoveBgTask {
        RemoveBgTask {
            id,
            input_image: "/uploads/in.png".into(),
            output_image: None,
            model: RemoveBgModel::Birefnet,
            status: TaskStatus::Queued,
            source_task_id: None,
            created_at: "2025-03-01T10:00:00".into(),
        }
    }

    fn msg(id: DbId, status: TaskStatus, paths: Option<Vec<&str>>) -> ProgressMessage {
        let mut m = ProgressMessage::new(TaskKind::RemoveBg, id, status);
        m.output_paths = paths.map(|p| p.into_iter().map(String::from).collect());
        m
    }

    fn started(id: DbId) -> RemoveBgState {
        let mut state = RemoveBgState::default();
        state.begin(&task(id));
        state
    }

    #[test]
    fn model_serializes_with_hyphen() {
        let json = serde_json::to_value(RemoveBgRequest {
            model: RemoveBgModel::BirefnetHr,
            ..RemoveBgRequest::from_generation("/o/a.png", 4)
        })
        .unwrap();
        assert_eq!(json["model"], "birefnet-hr");
        assert_eq!(json["source_task_id"], 4);
    }

    #[test]
    fn blank_input_image_is_rejected() {
        assert!(RemoveBgRequest::new("/uploads/in.png").validate().is_ok());
        assert_eq!(
            RemoveBgRequest::new(" ").validate(),
            Err(CoreError::Validation(
                "An input image is required for background removal".to_string()
            ))
        );
    }

    #[test]
    fn output_image_comes_from_first_path() {
        let mut state = started(1);
        state.apply_progress(&msg(1, TaskStatus::Running, Some(vec!["/o/a.png", "/o/b.png"])));
        assert_eq!(
            state.current.as_ref().unwrap().output_image.as_deref(),
            Some("/o/a.png")
        );
    }

    #[test]
    fn output_image_is_retained_without_paths() {
        let mut state = started(1);
        state.apply_progress(&msg(1, TaskStatus::Running, Some(vec!["/o/a.png"])));
        state.apply_progress(&msg(1, TaskStatus::Running, None));
        assert_eq!(
            state.current.as_ref().unwrap().output_image.as_deref(),
            Some("/o/a.png")
        );
    }

    #[test]
    fn other_task_is_ignored() {
        let mut state = started(1);
        assert_eq!(
            state.apply_progress(&msg(2, TaskStatus::Completed, Some(vec!["/o/x.png"]))),
            RemoveBgUpdate::Ignored
        );
        assert!(state.results.is_empty());
    }

    #[test]
    fn completion_snapshot_is_decoupled_from_current() {
        let mut state = started(1);
        assert_eq!(
            state.apply_progress(&msg(1, TaskStatus::Completed, Some(vec!["/o/cut.png"]))),
            RemoveBgUpdate::Completed
        );
        assert_eq!(state.results.len(), 1);

        // Later mutation of the current task must not leak into results.
        state.apply_progress(&msg(1, TaskStatus::Failed, Some(vec!["/o/other.png"])));
        assert_eq!(state.results[0].status, TaskStatus::Completed);
        assert_eq!(state.results[0].output_image.as_deref(), Some("/o/cut.png"));
    }

    #[test]
    fn repeated_completion_is_recorded_once() {
        let mut state = started(1);
        let done = msg(1, TaskStatus::Completed, Some(vec!["/o/cut.png"]));
        assert_eq!(state.apply_progress(&done), RemoveBgUpdate::Completed);
        assert_eq!(state.apply_progress(&done), RemoveBgUpdate::Merged);
        assert_eq!(state.results.len(), 1);
        assert_eq!(state.current.as_ref().unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn results_are_newest_first() {
        let mut state = started(1);
        state.apply_progress(&msg(1, TaskStatus::Completed, Some(vec!["/o/1.png"])));
        state.begin(&task(2));
        state.apply_progress(&msg(2, TaskStatus::Completed, Some(vec!["/o/2.png"])));
        let ids: Vec<_> = state.results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
