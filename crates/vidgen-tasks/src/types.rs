//! Task type system: status machine, request payload, runtime state.
//!
//! All types derive `Serialize` with `camelCase` keys so snapshots can be
//! printed or shipped as JSON.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use vidgen_core::music::DEFAULT_MUSIC_VOLUME;
use vidgen_providers::GenerateRequest;

// ─────────────────────────────────────────────
// TaskStatus
// ─────────────────────────────────────────────

/// `Queued -> Running -> {Succeeded, Failed, Cancelled, Timeout}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Timeout,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────
// TaskKind
// ─────────────────────────────────────────────

/// Which image inputs a request carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    TextToVideo,
    FirstFrame,
    LastFrame,
    FirstLastFrame,
}

impl TaskKind {
    pub fn from_frames(first: bool, last: bool) -> Self {
        match (first, last) {
            (true, true) => Self::FirstLastFrame,
            (true, false) => Self::FirstFrame,
            (false, true) => Self::LastFrame,
            (false, false) => Self::TextToVideo,
        }
    }

    /// Human-readable label used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TextToVideo => "Text-to-video",
            Self::FirstFrame => "First-frame image-to-video",
            Self::LastFrame => "Last-frame image-to-video",
            Self::FirstLastFrame => "First+last-frame image-to-video",
        }
    }
}

// ─────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────

/// Background music / soundtrack options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicOptions {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// 0.0 – 1.0.
    pub volume: f32,
}

impl Default for MusicOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            style: None,
            volume: DEFAULT_MUSIC_VOLUME,
        }
    }
}

/// What a caller hands to [`crate::TaskManager::submit_task`].
#[derive(Clone, Debug, Default)]
pub struct TaskRequest {
    pub prompt: String,
    pub resolution: String,
    pub fps: u32,
    pub duration: u32,
    pub first_frame: Option<String>,
    pub last_frame: Option<String>,
    pub audio: Option<String>,
    /// Where notifications go; `None` means nobody is notified.
    pub chat_id: Option<String>,
    pub user_id: String,
    /// Explicit model; the generator's current model otherwise.
    pub model_id: Option<String>,
    pub music: MusicOptions,
}

// ─────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────

/// One generation job and its runtime state.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    pub prompt: String,
    pub resolution: String,
    pub fps: u32,
    pub duration: u32,
    pub first_frame: Option<String>,
    pub last_frame: Option<String>,
    pub audio: Option<String>,
    pub chat_id: Option<String>,
    pub user_id: String,
    pub model_id: String,
    pub music: MusicOptions,

    pub status: TaskStatus,
    /// 0 – 100, never decreases while the task runs.
    pub progress: u8,
    pub poll_count: u32,
    /// Provider-assigned ID, set once submission succeeds.
    pub remote_id: Option<String>,
    pub video_url: Option<String>,
    pub local_path: Option<PathBuf>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A fresh queued task.
    pub fn new(id: impl Into<String>, model_id: impl Into<String>, req: TaskRequest) -> Self {
        Self {
            id: id.into(),
            kind: TaskKind::from_frames(req.first_frame.is_some(), req.last_frame.is_some()),
            prompt: req.prompt,
            resolution: req.resolution,
            fps: req.fps,
            duration: req.duration,
            first_frame: req.first_frame,
            last_frame: req.last_frame,
            audio: req.audio,
            chat_id: req.chat_id,
            user_id: req.user_id,
            model_id: model_id.into(),
            music: req.music,
            status: TaskStatus::Queued,
            progress: 0,
            poll_count: 0,
            remote_id: None,
            video_url: None,
            local_path: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Translate into a facade request.
    pub fn generate_request(&self) -> GenerateRequest {
        let mut extra = Map::new();
        if self.music.enabled {
            if let Some(style) = &self.music.style {
                extra.insert("music_style".into(), json!(style));
                extra.insert("music_volume".into(), json!(self.music.volume));
            }
        }
        if !self.user_id.is_empty() {
            extra.insert("user_id".into(), Value::from(self.user_id.clone()));
        }

        GenerateRequest {
            prompt: self.prompt.clone(),
            first_frame: self.first_frame.clone(),
            last_frame: self.last_frame.clone(),
            audio: self.audio.clone(),
            resolution: Some(self.resolution.clone()).filter(|r| !r.is_empty()),
            duration: Some(self.duration).filter(|d| *d > 0),
            fps: self.fps,
            model_id: Some(self.model_id.clone()),
            generate_audio: self.music.enabled,
            extra,
        }
    }
}

// ─────────────────────────────────────────────
// Snapshots
// ─────────────────────────────────────────────

/// Compact view of a task for status listings.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: String,
    pub prompt: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress: u8,
    pub model_id: String,
    pub poll_count: u32,
}

impl From<&Task> for TaskSummary {
    fn from(t: &Task) -> Self {
        Self {
            id: t.id.clone(),
            prompt: t.prompt.clone(),
            kind: t.kind,
            status: t.status,
            progress: t.progress,
            model_id: t.model_id.clone(),
            poll_count: t.poll_count,
        }
    }
}

/// Everything the manager is tracking right now.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub running: Vec<TaskSummary>,
    pub queued: Vec<TaskSummary>,
    pub completed: usize,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
