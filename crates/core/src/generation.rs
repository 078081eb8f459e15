//! Generation requests, the "current task" reducer, and request
//! validation.
//!
//! [`GenerationState`] is the authoritative client-side view of image
//! generation: the single current task with its nested frame progress,
//! the per-style result [`History`], and the loading/preview indicators.
//! It performs no I/O; the async reconciler in `artforge-sync` drives it
//! and carries out the side effects it reports.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::history::{results_from_paths, History, UNSTYLED_HISTORY_KEY};
use crate::progress::{ProgressMessage, TaskStatus};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Request defaults and limits
// ---------------------------------------------------------------------------

/// Negative prompt applied when the caller does not provide one.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "ugly, blurry, low quality, watermark, text";
/// Images per task when unspecified.
pub const DEFAULT_BATCH_SIZE: u32 = 1;
/// Largest batch the backend accepts.
pub const MAX_BATCH_SIZE: u32 = 32;
/// Upper bound of the ControlNet conditioning strength.
pub const MAX_CONTROLNET_STRENGTH: f64 = 2.0;

// ---------------------------------------------------------------------------
// Request / record types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    Txt2Img,
    Img2Img,
}

/// Preprocessor applied to a ControlNet control image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    Canny,
    Depth,
    Scribble,
    Lineart,
}

impl ControlType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Canny => "canny",
            Self::Depth => "depth",
            Self::Scribble => "scribble",
            Self::Lineart => "lineart",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlNetConfig {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    /// URL of the uploaded control image.
    pub image: Option<String>,
    pub strength: f64,
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub style_id: Option<DbId>,
    #[serde(rename = "type")]
    pub generation_type: GenerationType,
    pub prompt: String,
    pub negative_prompt: String,
    pub input_image: Option<String>,
    pub seed: Option<i64>,
    pub batch_size: u32,
    pub controlnet: Option<ControlNetConfig>,
}

impl GenerationRequest {
    /// Text-to-image request for a style with backend defaults.
    pub fn txt2img(style_id: DbId, prompt: impl Into<String>) -> Self {
        Self {
            style_id: Some(style_id),
            generation_type: GenerationType::Txt2Img,
            prompt: prompt.into(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            input_image: None,
            seed: None,
            batch_size: DEFAULT_BATCH_SIZE,
            controlnet: None,
        }
    }

    /// Image-to-image request using an uploaded reference image.
    pub fn img2img(
        style_id: DbId,
        prompt: impl Into<String>,
        input_image: impl Into<String>,
    ) -> Self {
        Self {
            generation_type: GenerationType::Img2Img,
            input_image: Some(input_image.into()),
            ..Self::txt2img(style_id, prompt)
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_controlnet(mut self, controlnet: ControlNetConfig) -> Self {
        self.controlnet = Some(controlnet);
        self
    }
}

/// Generation task record returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: DbId,
    pub style_id: Option<DbId>,
    #[serde(rename = "type")]
    pub generation_type: GenerationType,
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default)]
    pub input_image: Option<String>,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    pub status: TaskStatus,
    #[serde(default)]
    pub output_paths: Vec<String>,
    pub created_at: String,
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

/// Response of the ControlNet preprocessing preview endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlNetPreviewResponse {
    pub preview_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a request before it is sent.
///
/// - a style must be selected
/// - the prompt must not be blank
/// - image-to-image requires a reference image
/// - `batch_size` must be within `1..=MAX_BATCH_SIZE`
/// - an enabled ControlNet block needs an image and a strength in `0..=2`
pub fn validate_generation_request(request: &GenerationRequest) -> Result<(), CoreError> {
    if request.style_id.is_none() {
        return Err(CoreError::Validation(
            "A style must be selected before generating".to_string(),
        ));
    }
    if request.prompt.trim().is_empty() {
        return Err(CoreError::Validation("Prompt must not be empty".to_string()));
    }
    if request.generation_type == GenerationType::Img2Img
        && request.input_image.as_deref().map_or(true, str::is_empty)
    {
        return Err(CoreError::Validation(
            "Image-to-image generation requires a reference image".to_string(),
        ));
    }
    if request.batch_size == 0 || request.batch_size > MAX_BATCH_SIZE {
        return Err(CoreError::Validation(format!(
            "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
            request.batch_size
        )));
    }
    if let Some(cn) = request.controlnet.as_ref().filter(|cn| cn.enabled) {
        if cn.image.as_deref().map_or(true, str::is_empty) {
            return Err(CoreError::Validation(
                "ControlNet is enabled but no control image is attached".to_string(),
            ));
        }
        if !(0.0..=MAX_CONTROLNET_STRENGTH).contains(&cn.strength) {
            return Err(CoreError::Validation(format!(
                "ControlNet strength must be between 0 and {MAX_CONTROLNET_STRENGTH}, got {}",
                cn.strength
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Current task
// ---------------------------------------------------------------------------

/// Live view of the current generation task.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationTaskState {
    pub id: DbId,
    pub style_id: Option<DbId>,
    pub generation_type: GenerationType,
    pub status: TaskStatus,
    pub output_paths: Vec<String>,
    pub current_frame: u32,
    pub total_frames: u32,
    pub frame_progress: f64,
    /// Overall 0..1 progress across the batch, if reported.
    pub progress: Option<f64>,
    pub error: Option<String>,
}

impl GenerationTaskState {
    /// Fresh state for a just-submitted task with counters reset.
    pub fn from_task(task: &GenerationTask) -> Self {
        Self {
            id: task.id,
            style_id: task.style_id,
            generation_type: task.generation_type,
            status: task.status,
            output_paths: task.output_paths.clone(),
            current_frame: 0,
            total_frames: task.batch_size,
            frame_progress: 0.0,
            progress: None,
            error: None,
        }
    }

    /// Field-wise merge: absent fields keep their previous value.
    fn merge(&mut self, msg: &ProgressMessage) {
        self.status = msg.status;
        if let Some(paths) = &msg.output_paths {
            self.output_paths = paths.clone();
        }
        if let Some(frame) = msg.current_frame {
            self.current_frame = frame;
        }
        if let Some(total) = msg.total_frames {
            self.total_frames = total;
        }
        if let Some(fp) = msg.frame_progress {
            self.frame_progress = fp.clamp(0.0, 1.0);
        }
        if let Some(p) = msg.progress {
            self.progress = Some(p);
        }
        if let Some(err) = &msg.error {
            self.error = Some(err.clone());
        }
    }

    /// Key under which this task's results are filed.
    pub fn history_key(&self) -> DbId {
        self.style_id.unwrap_or(UNSTYLED_HISTORY_KEY)
    }
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

/// What applying a progress message did to the generation state.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationUpdate {
    /// No current task, or the message is for another task.
    Ignored,
    /// The current task was merged and is still in flight.
    Merged,
    /// The current task reached a terminal status.
    Finished {
        task_id: DbId,
        style_id: Option<DbId>,
        status: TaskStatus,
        /// Results prepended to the style's history.
        added_results: usize,
    },
}

/// Server-side preprocessed ControlNet preview for the attached image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlNetPreview {
    pub url: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationState {
    pub current: Option<GenerationTaskState>,
    pub history: History,
    /// A submission is in flight.
    pub loading: bool,
    /// Last submission failure, if any.
    pub error: Option<String>,
    pub controlnet_preview: ControlNetPreview,
}

impl GenerationState {
    /// Make `task` the current task with frame counters reset.
    pub fn begin(&mut self, task: &GenerationTask) {
        self.current = Some(GenerationTaskState::from_task(task));
        self.loading = false;
        self.error = None;
    }

    /// Merge a generation progress message into the current task.
    ///
    /// On a terminal status carrying `output_paths`, the paths become
    /// results prepended to the task's style history. A terminal message
    /// without paths produces no history entries.
    pub fn apply_progress(&mut self, msg: &ProgressMessage) -> GenerationUpdate {
        let Some(current) = self.current.as_mut().filter(|c| c.id == msg.id) else {
            return GenerationUpdate::Ignored;
        };

        current.merge(msg);
        if !msg.status.is_terminal() {
            return GenerationUpdate::Merged;
        }

        let task_id = current.id;
        let style_id = current.style_id;
        let history_key = current.history_key();

        let added_results = match &msg.output_paths {
            Some(paths) if msg.status.produced_output() => {
                let created_at = msg.emitted_at().unwrap_or_else(chrono::Utc::now);
                let results = results_from_paths(task_id, paths, created_at);
                self.history.prepend(history_key, results)
            }
            _ => 0,
        };

        GenerationUpdate::Finished {
            task_id,
            style_id,
            status: msg.status,
            added_results,
        }
    }

    /// Whether a task is queued or running.
    pub fn is_busy(&self) -> bool {
        self.loading
            || self
                .current
                .as_ref()
                .is_some_and(|c| !c.status.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::progress::TaskKind;

    fn task(id: DbId, style_id: Option<DbId>, batch_size: u32) -> GenerationTask {
        GenerationTask {
            id,
            style_id,
            generation_type: GenerationType::Txt2Img,
            prompt: "a castle".into(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.into(),
            input_image: None,
            seed: None,
            batch_size,
            status: TaskStatus::Queued,
            output_paths: vec![],
            created_at: "2025-03-01T10:00:00".into(),
        }
    }

    fn msg(id: DbId, status: TaskStatus) -> ProgressMessage {
        ProgressMessage::new(TaskKind::Generation, id, status)
    }

    fn started(id: DbId, style_id: Option<DbId>, batch_size: u32) -> GenerationState {
        let mut state = GenerationState::default();
        state.begin(&task(id, style_id, batch_size));
        state
    }

    // -- validation --

    #[test]
    fn valid_txt2img_request_passes() {
        assert!(validate_generation_request(&GenerationRequest::txt2img(1, "cat")).is_ok());
    }

    #[test]
    fn request_without_style_is_rejected() {
        let mut req = GenerationRequest::txt2img(1, "cat");
        req.style_id = None;
        assert_matches!(validate_generation_request(&req), Err(CoreError::Validation(_)));
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let req = GenerationRequest::txt2img(1, "   ");
        assert_matches!(validate_generation_request(&req), Err(CoreError::Validation(_)));
    }

    #[test]
    fn img2img_without_reference_is_rejected() {
        let mut req = GenerationRequest::img2img(1, "cat", "/uploads/ref.png");
        assert!(validate_generation_request(&req).is_ok());
        req.input_image = None;
        assert_matches!(validate_generation_request(&req), Err(CoreError::Validation(_)));
    }

    #[test]
    fn batch_size_bounds() {
        let req = GenerationRequest::txt2img(1, "cat").with_batch_size(0);
        assert!(validate_generation_request(&req).is_err());
        let req = GenerationRequest::txt2img(1, "cat").with_batch_size(MAX_BATCH_SIZE + 1);
        assert!(validate_generation_request(&req).is_err());
        let req = GenerationRequest::txt2img(1, "cat").with_batch_size(MAX_BATCH_SIZE);
        assert!(validate_generation_request(&req).is_ok());
    }

    #[test]
    fn enabled_controlnet_needs_image_and_sane_strength() {
        let mut cn = ControlNetConfig {
            enabled: true,
            control_type: ControlType::Canny,
            image: None,
            strength: 1.0,
        };
        let req = GenerationRequest::txt2img(1, "cat").with_controlnet(cn.clone());
        assert!(validate_generation_request(&req).is_err());

        cn.image = Some("/uploads/edges.png".into());
        cn.strength = 2.5;
        let req = GenerationRequest::txt2img(1, "cat").with_controlnet(cn.clone());
        assert!(validate_generation_request(&req).is_err());

        cn.strength = 0.8;
        let req = GenerationRequest::txt2img(1, "cat").with_controlnet(cn);
        assert!(validate_generation_request(&req).is_ok());
    }

    #[test]
    fn disabled_controlnet_is_not_checked() {
        let cn = ControlNetConfig {
            enabled: false,
            control_type: ControlType::Depth,
            image: None,
            strength: 9.0,
        };
        let req = GenerationRequest::txt2img(1, "cat").with_controlnet(cn);
        assert!(validate_generation_request(&req).is_ok());
    }

    #[test]
    fn request_serializes_type_field() {
        let json = serde_json::to_value(GenerationRequest::txt2img(3, "cat")).unwrap();
        assert_eq!(json["type"], "txt2img");
        assert_eq!(json["style_id"], 3);
        assert_eq!(json["batch_size"], 1);
    }

    // -- reducer --

    #[test]
    fn begin_resets_frame_counters() {
        let state = started(10, Some(7), 4);
        let current = state.current.unwrap();
        assert_eq!(current.current_frame, 0);
        assert_eq!(current.total_frames, 4);
        assert_eq!(current.frame_progress, 0.0);
        assert!(!state.loading);
    }

    #[test]
    fn message_for_other_task_is_ignored() {
        let mut state = started(10, Some(7), 4);
        let before = state.clone();
        let mut m = msg(11, TaskStatus::Completed);
        m.output_paths = Some(vec!["x.png".into()]);

        assert_eq!(state.apply_progress(&m), GenerationUpdate::Ignored);
        assert_eq!(state, before);
    }

    #[test]
    fn message_without_current_task_is_ignored() {
        let mut state = GenerationState::default();
        assert_eq!(state.apply_progress(&msg(1, TaskStatus::Running)), GenerationUpdate::Ignored);
        assert!(state.current.is_none());
    }

    #[test]
    fn partial_message_retains_unspecified_fields() {
        let mut state = started(10, Some(7), 4);
        let mut m = msg(10, TaskStatus::Running);
        m.output_paths = Some(vec!["/o/a.png".into()]);
        m.current_frame = Some(1);
        state.apply_progress(&m);

        let mut m = msg(10, TaskStatus::Running);
        m.current_frame = Some(2);
        m.frame_progress = Some(0.5);
        assert_eq!(state.apply_progress(&m), GenerationUpdate::Merged);

        let current = state.current.as_ref().unwrap();
        assert_eq!(current.output_paths, vec!["/o/a.png".to_string()]);
        assert_eq!(current.current_frame, 2);
        assert_eq!(current.total_frames, 4);
        assert_eq!(current.frame_progress, 0.5);
    }

    #[test]
    fn completed_batch_is_prepended_in_input_order() {
        let mut state = started(10, Some(7), 2);
        let mut m = msg(10, TaskStatus::Completed);
        m.output_paths = Some(vec!["a.png".into(), "b.png".into()]);

        assert_matches!(
            state.apply_progress(&m),
            GenerationUpdate::Finished { style_id: Some(7), added_results: 2, .. }
        );
        let results = state.history.for_style(7);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].image_url, "a.png");
        assert_eq!(results[1].image_url, "b.png");
    }

    #[test]
    fn newer_task_results_come_first() {
        let mut state = started(1, Some(7), 1);
        let mut m = msg(1, TaskStatus::Completed);
        m.output_paths = Some(vec!["old.png".into()]);
        state.apply_progress(&m);

        state.begin(&task(2, Some(7), 1));
        let mut m = msg(2, TaskStatus::Completed);
        m.output_paths = Some(vec!["new.png".into()]);
        state.apply_progress(&m);

        assert_eq!(state.history.urls_for_style(7), vec!["new.png", "old.png"]);
    }

    #[test]
    fn partial_status_also_records_results() {
        let mut state = started(10, Some(7), 3);
        let mut m = msg(10, TaskStatus::Partial);
        m.output_paths = Some(vec!["a.png".into()]);
        state.apply_progress(&m);
        assert_eq!(state.history.for_style(7).len(), 1);
    }

    #[test]
    fn terminal_message_without_paths_adds_nothing() {
        let mut state = started(10, Some(7), 1);
        assert_matches!(
            state.apply_progress(&msg(10, TaskStatus::Completed)),
            GenerationUpdate::Finished { added_results: 0, .. }
        );
        assert!(state.history.for_style(7).is_empty());
    }

    #[test]
    fn failed_message_records_error_but_no_results() {
        let mut state = started(10, Some(7), 1);
        let mut m = msg(10, TaskStatus::Failed);
        m.error = Some("CUDA out of memory".into());
        m.output_paths = Some(vec!["junk.png".into()]);

        assert_matches!(
            state.apply_progress(&m),
            GenerationUpdate::Finished { status: TaskStatus::Failed, added_results: 0, .. }
        );
        assert_eq!(
            state.current.as_ref().unwrap().error.as_deref(),
            Some("CUDA out of memory")
        );
        assert!(state.history.for_style(7).is_empty());
    }

    #[test]
    fn unstyled_task_files_under_default_key() {
        let mut state = started(10, None, 1);
        let mut m = msg(10, TaskStatus::Completed);
        m.output_paths = Some(vec!["a.png".into()]);
        state.apply_progress(&m);
        assert_eq!(state.history.for_style(UNSTYLED_HISTORY_KEY).len(), 1);
    }

    #[test]
    fn result_uses_message_timestamp() {
        let mut state = started(10, Some(7), 1);
        let mut m = msg(10, TaskStatus::Completed);
        m.output_paths = Some(vec!["a.png".into()]);
        m.timestamp = Some("2025-03-01T10:00:00+00:00".into());
        state.apply_progress(&m);
        assert_eq!(
            state.history.for_style(7)[0].created_at.to_rfc3339(),
            "2025-03-01T10:00:00+00:00"
        );
    }

    #[test]
    fn busy_until_terminal() {
        let mut state = started(10, Some(7), 1);
        assert!(state.is_busy());
        state.apply_progress(&msg(10, TaskStatus::Failed));
        assert!(!state.is_busy());
    }
}
