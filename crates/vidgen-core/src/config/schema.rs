//! Configuration schema.
//!
//! Hierarchy: `Config` → `GenerationConfig`, `QueueConfig`, `PollerConfig`,
//! `HttpConfig`, `DownloadConfig`, `TemplatesConfig`, and the `models` map.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.vidgen/config.json` + env vars.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub queue: QueueConfig,
    pub poller: PollerConfig,
    pub http: HttpConfig,
    pub download: DownloadConfig,
    pub templates: TemplatesConfig,
    /// Model entries keyed by model ID (e.g. `"model1"`).
    pub models: BTreeMap<String, ModelConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            queue: QueueConfig::default(),
            poller: PollerConfig::default(),
            http: HttpConfig::default(),
            download: DownloadConfig::default(),
            templates: TemplatesConfig::default(),
            models: default_models(),
        }
    }
}

// ─────────────────────────────────────────────
// Generation defaults
// ─────────────────────────────────────────────

/// Defaults applied when a request leaves a parameter unset.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    /// Model ID used when the caller does not pick one.
    pub default_model: String,
    pub default_resolution: String,
    pub default_fps: u32,
    /// Seconds.
    pub default_duration: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model: "model1".to_string(),
            default_resolution: "720p".to_string(),
            default_fps: 24,
            default_duration: 5,
        }
    }
}

// ─────────────────────────────────────────────
// Queue
// ─────────────────────────────────────────────

/// Task queue and scheduler settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    /// Maximum number of tasks waiting behind the running one.
    pub max_queue_size: usize,
    /// Seconds before a running task is marked as timed out.
    pub task_timeout: u64,
    /// Seconds between scheduler iterations while idle.
    pub poll_interval: u64,
    /// Drop old completed tasks while the scheduler is idle.
    pub auto_cleanup: bool,
    /// Seconds a completed task is kept when `auto_cleanup` is on.
    pub cleanup_delay: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10,
            task_timeout: 600,
            poll_interval: 5,
            auto_cleanup: true,
            cleanup_delay: 3600,
        }
    }
}

/// Adaptive polling intervals (seconds).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollerConfig {
    pub initial_interval: f64,
    pub max_interval: f64,
    pub multiplier: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_interval: 2.0,
            max_interval: 30.0,
            multiplier: 1.5,
        }
    }
}

// ─────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────

/// Shared HTTP client settings used by every provider adapter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub max_retries: u32,
    /// Base backoff delay in seconds.
    pub base_delay: f64,
    /// Backoff cap in seconds.
    pub max_delay: f64,
    /// HTTP statuses that trigger a retry.
    pub retry_on_status: Vec<u16>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: 60,
            max_retries: 3,
            base_delay: 1.0,
            max_delay: 30.0,
            retry_on_status: vec![429, 500, 502, 503, 504],
        }
    }
}

// ─────────────────────────────────────────────
// Download
// ─────────────────────────────────────────────

/// Where and how finished videos are fetched.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadConfig {
    /// Target directory (supports `~`).
    pub dir: String,
    /// Maximum number of finished videos kept on disk.
    pub max_files: usize,
    /// Whole-transfer timeout in seconds.
    pub timeout: u64,
    pub resume: bool,
    /// Orphaned `.tmp` files older than this many seconds are removed.
    pub stale_temp_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: "~/.vidgen/videos".to_string(),
            max_files: 10,
            timeout: 300,
            resume: true,
            stale_temp_secs: 3600,
        }
    }
}

// ─────────────────────────────────────────────
// Templates
// ─────────────────────────────────────────────

/// Preset prompt templates.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplatesConfig {
    pub enabled: bool,
    pub list: Vec<TemplateConfig>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            list: Vec::new(),
        }
    }
}

/// A single keyword-addressable preset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateConfig {
    pub keyword: String,
    pub description: String,
    pub prompt: String,
    pub resolution: String,
    pub fps: u32,
    pub duration: u32,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            description: String::new(),
            prompt: String::new(),
            resolution: "720p".to_string(),
            fps: 24,
            duration: 5,
        }
    }
}

// ─────────────────────────────────────────────
// Models
// ─────────────────────────────────────────────

/// One configured model entry.
///
/// `format` selects the provider adapter (`volcengine`, `aliyun`, `zhipu`,
/// `openai`); `model` is the vendor's own model name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    /// Display name.
    pub name: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// API key; `${ENV_VAR}` placeholders are expanded on load.
    pub api_key: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_duration: Option<u32>,
    pub prompt_extend: bool,
    pub watermark: bool,
    #[serde(rename = "supportImg2video")]
    pub support_img2video: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            format: String::new(),
            base_url: None,
            api_key: String::new(),
            model: String::new(),
            default_resolution: None,
            default_duration: None,
            prompt_extend: true,
            watermark: false,
            support_img2video: true,
        }
    }
}

impl ModelConfig {
    /// Whether this model has a usable API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Display name, falling back to the vendor model name.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.model
        } else {
            &self.name
        }
    }
}

/// Built-in model entries, one per supported format.
fn default_models() -> BTreeMap<String, ModelConfig> {
    let entries = [
        (
            "model1",
            "Doubao Seedance 1.5 Pro",
            "volcengine",
            "${ARK_API_KEY}",
            "doubao-seedance-1-5-pro-251215",
        ),
        (
            "model2",
            "Wan 2.5 I2V Plus",
            "aliyun",
            "${DASHSCOPE_API_KEY}",
            "wan2.5-i2v-plus",
        ),
        (
            "model3",
            "CogVideoX-3",
            "zhipu",
            "${ZHIPU_API_KEY}",
            "cogvideox-3",
        ),
        (
            "model4",
            "OpenAI-compatible",
            "openai",
            "${OPENAI_API_KEY}",
            "sora-2",
        ),
    ];

    entries
        .into_iter()
        .map(|(id, name, format, key, model)| {
            (
                id.to_string(),
                ModelConfig {
                    name: name.to_string(),
                    format: format.to_string(),
                    api_key: key.to_string(),
                    model: model.to_string(),
                    ..ModelConfig::default()
                },
            )
        })
        .collect()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
