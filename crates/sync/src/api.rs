//! REST client for the backend job endpoints.
//!
//! Reconcilers talk to the backend through [`JobApi`] so they can be
//! driven by a fake in tests. [`ArtforgeApi`] is the [`reqwest`]-backed
//! implementation.

use std::time::Duration;

use artforge_core::generation::{
    ControlNetPreviewResponse, ControlType, GenerationRequest, GenerationTask,
};
use artforge_core::progress::TaskKind;
use artforge_core::remove_bg::{RemoveBgRequest, RemoveBgTask};
use artforge_core::training::{TrainingJob, TrainingRequest};
use artforge_core::types::DbId;
use async_trait::async_trait;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// One row of `GET /api/tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListItem {
    pub id: DbId,
    pub task_kind: TaskKind,
    /// Free-form backend status string.
    pub status: String,
    pub created_at: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub output_paths: Option<Vec<String>>,
}

/// Backend operations the reconcilers depend on.
#[async_trait]
pub trait JobApi: Send + Sync + 'static {
    async fn submit_generation(&self, request: &GenerationRequest) -> Result<GenerationTask, ApiError>;

    /// Upload a control image and get back the preprocessed preview.
    async fn controlnet_preview(
        &self,
        image: Vec<u8>,
        file_name: &str,
        control_type: ControlType,
    ) -> Result<ControlNetPreviewResponse, ApiError>;

    async fn submit_training(&self, request: &TrainingRequest) -> Result<TrainingJob, ApiError>;

    async fn submit_remove_bg(&self, request: &RemoveBgRequest) -> Result<RemoveBgTask, ApiError>;
}

/// HTTP client for one backend origin.
#[derive(Debug, Clone)]
pub struct ArtforgeApi {
    client: reqwest::Client,
    base_url: String,
}

impl ArtforgeApi {
    /// Create a client for `base_url`, e.g. `http://127.0.0.1:8000`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List generation and training tasks, newest first.
    pub async fn fetch_tasks(&self) -> Result<Vec<TaskListItem>, ApiError> {
        let response = self.client.get(self.url("/api/tasks")).send().await?;
        Self::parse_response(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::parse_response(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ---- private helpers ----

    /// Pass 2xx responses through; turn anything else into
    /// [`ApiError::Status`], using the backend's `detail` message when
    /// the body carries one.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl JobApi for ArtforgeApi {
    async fn submit_generation(&self, request: &GenerationRequest) -> Result<GenerationTask, ApiError> {
        tracing::debug!(style_id = ?request.style_id, batch_size = request.batch_size, "Submitting generation");
        self.post_json("/api/generate", request).await
    }

    async fn controlnet_preview(
        &self,
        image: Vec<u8>,
        file_name: &str,
        control_type: ControlType,
    ) -> Result<ControlNetPreviewResponse, ApiError> {
        let form = multipart::Form::new()
            .part("image", multipart::Part::bytes(image).file_name(file_name.to_string()))
            .text("control_type", control_type.as_str());

        let response = self
            .client
            .post(self.url("/api/controlnet/preview"))
            .multipart(form)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn submit_training(&self, request: &TrainingRequest) -> Result<TrainingJob, ApiError> {
        tracing::debug!(style_name = %request.style_name, "Submitting training job");
        self.post_json("/api/training", request).await
    }

    async fn submit_remove_bg(&self, request: &RemoveBgRequest) -> Result<RemoveBgTask, ApiError> {
        tracing::debug!(input_image = %request.input_image, "Submitting background removal");
        self.post_json("/api/remove-bg", request).await
    }
}

/// Extract a human-readable message from an error body.
///
/// FastAPI-style `{"detail": "..."}` and `{"message": "..."}` bodies
/// yield their message; anything else is returned as-is.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: Option<serde_json::Value>,
        message: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: Some(serde_json::Value::String(detail)),
            ..
        }) => detail,
        Ok(ErrorBody {
            detail: Some(detail),
            ..
        }) => detail.to_string(),
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ if body.trim().is_empty() => "<empty body>".to_string(),
        _ => body.to_string(),
    }
}
