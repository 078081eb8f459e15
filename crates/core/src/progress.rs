//! Progress message types and parser.
//!
//! The backend pushes one JSON object per text frame:
//!
//! ```json
//! {"kind": "generation", "id": 12, "status": "running",
//!  "current_frame": 2, "total_frames": 4, "frame_progress": 0.5}
//! ```
//!
//! Every field except `kind`, `id` and `status` is optional; a message
//! only carries what changed. `kind` selects the job domain.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Literal keep-alive payload sent by the client. Not JSON.
pub const KEEPALIVE_PAYLOAD: &str = "ping";

// ---------------------------------------------------------------------------
// Discriminants
// ---------------------------------------------------------------------------

/// Job domain a progress message belongs to.
///
/// Unknown kinds deserialize to [`TaskKind::Unknown`] so a newer backend
/// can introduce domains without breaking older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Generation,
    Training,
    RemoveBg,
    #[serde(other)]
    Unknown,
}

/// Lifecycle status shared by all job domains.
///
/// `Partial` is only produced by generation batches where some frames
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Partial,
}

impl TaskStatus {
    /// Whether the job will receive no further progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Partial)
    }

    /// Whether the job finished with usable output.
    pub fn produced_output(self) -> bool {
        matches!(self, Self::Completed | Self::Partial)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One decoded progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub kind: TaskKind,
    pub id: DbId,
    pub status: TaskStatus,
    /// Overall progress. Generation reports a 0..1 fraction, training a
    /// 0..100 percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// 1-based index of the frame being produced within a batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_frame: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u32>,
    /// Progress of the current frame, 0..1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_paths: Option<Vec<String>>,
    /// Failure reason, present on some `failed` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 emission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ProgressMessage {
    /// Bare message with only the required fields set.
    pub fn new(kind: TaskKind, id: DbId, status: TaskStatus) -> Self {
        Self {
            kind,
            id,
            status,
            progress: None,
            current_frame: None,
            total_frames: None,
            frame_progress: None,
            output_paths: None,
            error: None,
            timestamp: None,
        }
    }

    /// Emission time, if present and well-formed.
    pub fn emitted_at(&self) -> Option<crate::types::Timestamp> {
        self.timestamp
            .as_deref()
            .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&chrono::Utc))
    }
}

/// Parse a text frame into a [`ProgressMessage`].
///
/// Returns `Err` for malformed JSON, missing required fields or an
/// unknown `status`. Callers drop such frames and continue.
pub fn parse_message(text: &str) -> Result<ProgressMessage, serde_json::Error> {
    serde_json::from_str(text)
}
