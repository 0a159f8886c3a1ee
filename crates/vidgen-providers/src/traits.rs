//! Video provider trait: the uniform task-lifecycle contract.
//!
//! Every vendor (Volcengine, Aliyun, Zhipu, OpenAI-compatible) implements
//! this trait. Only the adapter knows its vendor's wire format; everything
//! above it sees [`TaskStatusReport`] with a normalized [`RemoteStatus`].

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::capabilities::{get_provider_capabilities, ProviderCapabilities};
use crate::http::HttpError;

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

/// Why a provider call failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Http(#[from] HttpError),
    /// The vendor accepted the request but the response had no task ID.
    #[error("{provider}: response carried no task id: {body}")]
    MissingTaskId { provider: &'static str, body: String },
    /// Every candidate endpoint answered 404 (or was unreachable).
    #[error("no endpoint accepted the request: {0}")]
    NoEndpoint(String),
}

// ─────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────

/// Parameters for creating a remote generation task.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateTaskRequest {
    /// Vendor model name.
    pub model: String,
    pub prompt: String,
    /// First-frame image (URL or data URI).
    pub first_frame: Option<String>,
    /// Last-frame image (URL or data URI).
    pub last_frame: Option<String>,
    pub audio: Option<String>,
    pub resolution: String,
    /// Seconds.
    pub duration: u32,
    pub fps: u32,
    pub watermark: bool,
    pub prompt_extend: bool,
    /// Ask the vendor to generate a soundtrack.
    pub generate_audio: bool,
    /// Vendor-specific extras (e.g. `negative_prompt`, `quality`, `user_id`).
    pub extra: Map<String, Value>,
}

impl Default for CreateTaskRequest {
    fn default() -> Self {
        Self {
            model: String::new(),
            prompt: String::new(),
            first_frame: None,
            last_frame: None,
            audio: None,
            resolution: "720p".to_string(),
            duration: 5,
            fps: 24,
            watermark: false,
            prompt_extend: true,
            generate_audio: false,
            extra: Map::new(),
        }
    }
}

impl CreateTaskRequest {
    /// String extra, if present and non-empty.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Boolean extra, defaulting to `false`.
    pub fn extra_flag(&self, key: &str) -> bool {
        self.extra.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

// ─────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────

/// Provider status mapped onto the common vocabulary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Error,
    /// Anything else, lower-cased. Treated as non-terminal.
    Other(String),
}

impl RemoteStatus {
    /// Map an already-normalized status word.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "queued" => Self::Queued,
            "running" | "processing" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "error" => Self::Error,
            _ => Self::Other(lower),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Error
        )
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized answer to a status query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskStatusReport {
    pub status: RemoteStatus,
    /// 0 – 100, as reported or estimated by the adapter.
    pub progress: u8,
    pub video_url: Option<String>,
    pub message: Option<String>,
}

impl TaskStatusReport {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            progress: 0,
            video_url: None,
            message: None,
        }
    }

    /// A terminal `error` report (configuration problems, unknown model).
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(RemoteStatus::Error)
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress.min(100);
        self
    }

    pub fn with_video_url(mut self, url: Option<String>) -> Self {
        self.video_url = url.filter(|u| !u.is_empty());
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message.filter(|m| !m.is_empty());
        self
    }
}

/// Result of a cancel request. Never an error: unsupported providers
/// answer `ok = false` with a reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancelOutcome {
    pub ok: bool,
    pub message: String,
}

impl CancelOutcome {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────
// VideoProvider
// ─────────────────────────────────────────────

/// Trait that all video providers must implement.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Adapter format name (`"volcengine"`, `"aliyun"`, ...).
    fn name(&self) -> &'static str;

    /// Declared capabilities for this provider, if any.
    fn capabilities(&self) -> Option<&'static ProviderCapabilities> {
        get_provider_capabilities(self.name())
    }

    /// Coerce duration, fps, and resolution into what the model accepts.
    ///
    /// Warnings are logged and never block submission. Models without
    /// declared capabilities pass through untouched.
    fn coerce_request(&self, request: &CreateTaskRequest) -> CreateTaskRequest {
        let mut out = request.clone();
        let Some(model) = self
            .capabilities()
            .and_then(|caps| caps.get_model(&request.model))
        else {
            return out;
        };

        let validated = model.validate_params(
            request.duration,
            &request.resolution,
            request.fps,
            request.first_frame.is_some(),
            request.last_frame.is_some(),
        );
        for w in &validated.warnings {
            warn!(provider = self.name(), model = %request.model, "{}", w);
        }
        out.duration = validated.duration;
        out.fps = validated.fps;
        out.resolution = validated.resolution;
        out
    }

    /// Submit a generation request; returns the provider's task ID.
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<String, ProviderError>;

    /// Query a remote task.
    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusReport, ProviderError>;

    /// Ask the provider to cancel a remote task.
    async fn cancel_task(&self, task_id: &str) -> CancelOutcome;
}
