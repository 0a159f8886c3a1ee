//! Generator facade: resolves a model ID to a cached adapter and forwards
//! create/status/cancel calls to it.
//!
//! Configuration problems (unknown model, missing key, unknown format) are
//! caught here before any network I/O happens.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use vidgen_core::config::{Config, HttpConfig, ModelConfig};

use crate::capabilities::get_model_capabilities;
use crate::registry::{find_adapter, AdapterConfig};
use crate::traits::{
    CancelOutcome, CreateTaskRequest, ProviderError, TaskStatusReport, VideoProvider,
};

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("model '{0}' does not exist")]
    UnknownModel(String),
    #[error("model '{0}' has no API key configured")]
    MissingCredential(String),
    #[error("model '{model_id}' uses unsupported format '{format}'")]
    UnsupportedFormat { model_id: String, format: String },
    #[error("no video models are configured")]
    NoModels,
    #[error("{model_id}: {source}")]
    Provider {
        model_id: String,
        #[source]
        source: ProviderError,
    },
}

// ─────────────────────────────────────────────
// Request / listing types
// ─────────────────────────────────────────────

/// A generation request as the facade receives it.
///
/// `resolution` and `duration` fall back to the model's own defaults when
/// unset.
#[derive(Clone, Debug, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub first_frame: Option<String>,
    pub last_frame: Option<String>,
    pub audio: Option<String>,
    pub resolution: Option<String>,
    pub duration: Option<u32>,
    pub fps: u32,
    /// Explicit model; the current model is used otherwise.
    pub model_id: Option<String>,
    pub generate_audio: bool,
    pub extra: Map<String, Value>,
}

/// A successfully submitted task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub remote_id: String,
    pub model_id: String,
}

/// One row of [`VideoGenerator::model_list`].
#[derive(Clone, Debug, Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
    pub model: String,
    pub format: String,
    pub configured: bool,
    pub support_img2video: bool,
    pub current: bool,
}

// ─────────────────────────────────────────────
// VideoGenerator
// ─────────────────────────────────────────────

pub struct VideoGenerator {
    models: BTreeMap<String, ModelConfig>,
    http: HttpConfig,
    current: RwLock<String>,
    /// One adapter per model ID, built on first use.
    providers: RwLock<HashMap<String, Arc<dyn VideoProvider>>>,
}

impl VideoGenerator {
    pub fn new(models: BTreeMap<String, ModelConfig>, default_model: &str, http: HttpConfig) -> Self {
        let configured = models.values().filter(|m| m.is_configured()).count();
        info!(
            models = models.len(),
            configured = configured,
            default_model = default_model,
            "video generator ready"
        );
        Self {
            models,
            http,
            current: RwLock::new(default_model.to_string()),
            providers: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.models.clone(),
            &config.generation.default_model,
            config.http.clone(),
        )
    }

    /// Pre-register an adapter for `model_id`, bypassing the registry.
    pub fn with_provider(self, model_id: &str, provider: Arc<dyn VideoProvider>) -> Self {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model_id.to_string(), provider);
        self
    }

    // ── Model selection ──

    pub fn current_model(&self) -> String {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn model_config(&self, model_id: &str) -> Option<&ModelConfig> {
        self.models.get(model_id).filter(|m| !m.format.trim().is_empty())
    }

    /// Make `model_id` the current model. Leaves the current model alone on
    /// failure.
    pub fn switch_model(&self, model_id: &str) -> Result<(), GeneratorError> {
        let cfg = self.checked_config(model_id)?;
        if find_adapter(&cfg.format).is_none() {
            warn!(model_id = model_id, format = %cfg.format, "switch refused: unknown format");
            return Err(GeneratorError::UnsupportedFormat {
                model_id: model_id.to_string(),
                format: cfg.format.clone(),
            });
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = model_id.to_string();
        info!(model_id = model_id, "switched current model");
        Ok(())
    }

    pub fn model_list(&self) -> Vec<ModelSummary> {
        let current = self.current_model();
        self.models
            .iter()
            .filter(|(_, m)| !m.format.trim().is_empty())
            .map(|(id, m)| ModelSummary {
                id: id.clone(),
                name: m.display_name().to_string(),
                model: m.model.clone(),
                format: m.format.clone(),
                configured: m.is_configured(),
                support_img2video: m.support_img2video,
                current: *id == current,
            })
            .collect()
    }

    /// Models with a usable API key.
    pub fn available_models(&self) -> Vec<ModelSummary> {
        self.model_list().into_iter().filter(|m| m.configured).collect()
    }

    /// Declared capabilities for a model, or a minimal echo of its config
    /// when the registry has no record.
    pub fn model_capabilities(&self, model_id: &str) -> Option<Value> {
        let cfg = self.model_config(model_id)?;
        if let Some(caps) = get_model_capabilities(&cfg.format, &cfg.model) {
            if let Ok(v) = serde_json::to_value(caps) {
                return Some(v);
            }
        }
        Some(json!({
            "model_id": model_id,
            "display_name": cfg.display_name(),
            "format": cfg.format,
            "support_img2video": cfg.support_img2video,
        }))
    }

    // ── Provider resolution ──

    fn checked_config(&self, model_id: &str) -> Result<&ModelConfig, GeneratorError> {
        if self.models.is_empty() {
            return Err(GeneratorError::NoModels);
        }
        let cfg = self
            .model_config(model_id)
            .ok_or_else(|| GeneratorError::UnknownModel(model_id.to_string()))?;
        if !cfg.is_configured() {
            return Err(GeneratorError::MissingCredential(model_id.to_string()));
        }
        Ok(cfg)
    }

    /// Cached adapter for `model_id`, built on first use.
    pub fn provider_for(&self, model_id: &str) -> Result<Arc<dyn VideoProvider>, GeneratorError> {
        if let Some(p) = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model_id)
        {
            return Ok(Arc::clone(p));
        }

        let cfg = self.checked_config(model_id)?;
        let spec = find_adapter(&cfg.format).ok_or_else(|| GeneratorError::UnsupportedFormat {
            model_id: model_id.to_string(),
            format: cfg.format.clone(),
        })?;

        let provider = spec.build(&AdapterConfig::from_model(cfg, &self.http));
        info!(model_id = model_id, format = spec.format, "adapter initialised");
        let mut cache = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            cache.entry(model_id.to_string()).or_insert(provider),
        ))
    }

    // ── Task calls ──

    /// Submit a generation request to the chosen (or current) model.
    pub async fn generate(&self, request: GenerateRequest) -> Result<Submission, GeneratorError> {
        let model_id = request.model_id.clone().unwrap_or_else(|| self.current_model());
        let cfg = self.checked_config(&model_id)?;
        let provider = self.provider_for(&model_id)?;

        let mut first_frame = request.first_frame;
        let mut last_frame = request.last_frame;
        let declared_i2v = get_model_capabilities(&cfg.format, &cfg.model)
            .map(|c| c.has_img2video())
            .unwrap_or(true);
        if (first_frame.is_some() || last_frame.is_some())
            && (!cfg.support_img2video || !declared_i2v)
        {
            warn!(model_id = %model_id, "model has no image-to-video support, dropping images");
            first_frame = None;
            last_frame = None;
        }

        let mode = match (&first_frame, &last_frame) {
            (Some(_), Some(_)) => "first+last frame",
            (Some(_), None) => "first frame",
            (None, Some(_)) => "last frame",
            (None, None) => "text-to-video",
        };

        let create = CreateTaskRequest {
            model: cfg.model.clone(),
            prompt: request.prompt,
            first_frame,
            last_frame,
            audio: request.audio,
            resolution: request
                .resolution
                .filter(|r| !r.trim().is_empty())
                .or_else(|| cfg.default_resolution.clone())
                .unwrap_or_else(|| "720p".to_string()),
            duration: request
                .duration
                .filter(|d| *d > 0)
                .or(cfg.default_duration)
                .unwrap_or(5),
            fps: request.fps,
            watermark: cfg.watermark,
            prompt_extend: cfg.prompt_extend,
            generate_audio: request.generate_audio,
            extra: request.extra,
        };
        info!(model_id = %model_id, mode = mode, "submitting generation task");

        match provider.create_task(&create).await {
            Ok(remote_id) => {
                info!(model_id = %model_id, remote_id = %remote_id, "task accepted");
                Ok(Submission { remote_id, model_id })
            }
            Err(source) => {
                error!(model_id = %model_id, error = %source, "task submission failed");
                Err(GeneratorError::Provider { model_id, source })
            }
        }
    }

    /// Query a remote task.
    ///
    /// Configuration problems come back as a terminal `error` report;
    /// transport failures come back as `Err` so callers can retry.
    pub async fn task_status(
        &self,
        remote_id: &str,
        model_id: &str,
    ) -> Result<TaskStatusReport, ProviderError> {
        let provider = match self.provider_for(model_id) {
            Ok(p) => p,
            Err(e) => return Ok(TaskStatusReport::error(e.to_string())),
        };
        let report = provider.get_task_status(remote_id).await?;
        debug!(remote_id = remote_id, status = %report.status, progress = report.progress, "task status");
        Ok(report)
    }

    pub async fn cancel(&self, remote_id: &str, model_id: &str) -> CancelOutcome {
        match self.provider_for(model_id) {
            Ok(p) => p.cancel_task(remote_id).await,
            Err(e) => CancelOutcome::rejected(e.to_string()),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
