//! One-line summaries of job state.

use std::collections::HashMap;
use std::fmt::Write;

use artforge_core::generation::{GenerationState, GenerationTaskState};
use artforge_core::remove_bg::{RemoveBgState, RemoveBgTaskState};
use artforge_core::training::{TrainingJobState, TrainingState};
use artforge_core::types::DbId;
use artforge_sync::ConnectionStatus;

pub fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "connected",
        ConnectionStatus::Disconnected => "disconnected",
    }
}

pub fn generation_line(task: &GenerationTaskState) -> String {
    let mut line = format!("generation #{} [{}]", task.id, task.status);
    if task.total_frames > 1 || task.current_frame > 0 {
        let _ = write!(line, " frame {}/{}", task.current_frame, task.total_frames);
    }
    if !task.status.is_terminal() && task.frame_progress > 0.0 {
        let _ = write!(line, " {:.0}%", task.frame_progress * 100.0);
    }
    if task.status.produced_output() && !task.output_paths.is_empty() {
        let _ = write!(line, " -> {} image(s)", task.output_paths.len());
    }
    if let Some(error) = &task.error {
        let _ = write!(line, " error: {error}");
    }
    line
}

pub fn training_line(job: &TrainingJobState) -> String {
    format!("training #{} [{}] {:.1}%", job.id, job.status, job.progress)
}

pub fn remove_bg_line(task: &RemoveBgTaskState) -> String {
    match &task.output_image {
        Some(output) => format!("remove-bg #{} [{}] -> {output}", task.id, task.status),
        None => format!("remove-bg #{} [{}]", task.id, task.status),
    }
}

/// Remembers the last line logged per job so unchanged state is not
/// logged twice.
#[derive(Debug, Default)]
pub struct ProgressLog {
    generation: Option<String>,
    training: HashMap<DbId, String>,
    remove_bg: Option<String>,
}

impl ProgressLog {
    pub fn generation(&mut self, state: &GenerationState) -> Option<String> {
        let line = generation_line(state.current.as_ref()?);
        fresh(&mut self.generation, line)
    }

    /// New lines for every job whose summary changed, newest job first.
    /// Jobs that left `active_jobs` are forgotten.
    pub fn training(&mut self, state: &TrainingState) -> Vec<String> {
        self.training
            .retain(|id, _| state.active_jobs.iter().any(|job| job.id == *id));
        state
            .active_jobs
            .iter()
            .filter_map(|job| {
                let line = training_line(job);
                if self.training.get(&job.id) == Some(&line) {
                    return None;
                }
                self.training.insert(job.id, line.clone());
                Some(line)
            })
            .collect()
    }

    pub fn remove_bg(&mut self, state: &RemoveBgState) -> Option<String> {
        let line = remove_bg_line(state.current.as_ref()?);
        fresh(&mut self.remove_bg, line)
    }
}

fn fresh(last: &mut Option<String>, line: String) -> Option<String> {
    if last.as_deref() == Some(line.as_str()) {
        return None;
    }
    *last = Some(line.clone());
    Some(line)
}

#[cfg(test)]
mod tests {
    use artforge_core::generation::GenerationType;
    use artforge_core::progress::TaskStatus;

    use super::*;

    fn task(status: TaskStatus) -> GenerationTaskState {
        GenerationTaskState {
            id: 12,
            style_id: Some(7),
            generation_type: GenerationType::Txt2Img,
            status,
            output_paths: vec![],
            current_frame: 2,
            total_frames: 4,
            frame_progress: 0.5,
            progress: None,
            error: None,
        }
    }

    #[test]
    fn running_generation_shows_frames_and_percent() {
        assert_eq!(generation_line(&task(TaskStatus::Running)), "generation #12 [running] frame 2/4 50%");
    }

    #[test]
    fn finished_generation_shows_image_count() {
        let mut t = task(TaskStatus::Completed);
        t.output_paths = vec!["a.png".into(), "b.png".into()];
        assert_eq!(generation_line(&t), "generation #12 [completed] frame 2/4 -> 2 image(s)");
    }

    #[test]
    fn failed_generation_shows_error() {
        let mut t = task(TaskStatus::Failed);
        t.error = Some("CUDA out of memory".into());
        assert!(generation_line(&t).ends_with("error: CUDA out of memory"));
    }

    #[test]
    fn unchanged_state_is_not_logged_twice() {
        let mut log = ProgressLog::default();
        let state = GenerationState {
            current: Some(task(TaskStatus::Running)),
            ..GenerationState::default()
        };
        assert!(log.generation(&state).is_some());
        assert!(log.generation(&state).is_none());
    }

    #[test]
    fn only_changed_training_jobs_are_reported() {
        let mut log = ProgressLog::default();
        let mut state = TrainingState::default();
        state.active_jobs = vec![
            TrainingJobState { id: 2, status: TaskStatus::Running, progress: 10.0 },
            TrainingJobState { id: 1, status: TaskStatus::Running, progress: 80.0 },
        ];
        assert_eq!(log.training(&state).len(), 2);

        state.active_jobs[1].progress = 90.0;
        assert_eq!(log.training(&state), vec!["training #1 [running] 90.0%".to_string()]);
    }

    #[test]
    fn training_log_forgets_departed_jobs() {
        let mut log = ProgressLog::default();
        let mut state = TrainingState::default();
        state.active_jobs = vec![
            TrainingJobState { id: 2, status: TaskStatus::Running, progress: 10.0 },
            TrainingJobState { id: 1, status: TaskStatus::Completed, progress: 100.0 },
        ];
        log.training(&state);
        assert_eq!(log.training.len(), 2);

        state.active_jobs.truncate(1);
        assert!(log.training(&state).is_empty());
        assert_eq!(log.training.len(), 1);
        assert!(log.training.contains_key(&2));
    }

    #[test]
    fn remove_bg_line_includes_output() {
        let t = RemoveBgTaskState {
            id: 5,
            status: TaskStatus::Completed,
            output_image: Some("/outputs/rmbg_5.png".into()),
        };
        assert_eq!(remove_bg_line(&t), "remove-bg #5 [completed] -> /outputs/rmbg_5.png");
    }
}
