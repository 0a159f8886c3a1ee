//! OpenAI-compatible passthrough adapter (relays, self-hosted gateways).
//!
//! The exact API shape is not known up front, so every call probes an
//! ordered list of candidate endpoints. A 404 means "try the next one";
//! any other HTTP error status aborts the probe. Response fields are read
//! through ordered [`ExtractRule`] lists, first non-empty value wins.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::http::{HttpClient, HttpError};
use crate::registry::AdapterConfig;
use crate::traits::{
    CancelOutcome, CreateTaskRequest, ProviderError, RemoteStatus, TaskStatusReport,
    VideoProvider,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Prefix of the synthetic IDs handed out for synchronous results.
pub const SYNC_PREFIX: &str = "sync_";

const CREATE_PATHS: &[&str] = &[
    "/video/generations",
    "/videos/generations",
    "/v1/video/generations",
    "/generations/video",
];

const STATUS_PATHS: &[&str] = &[
    "/video/generations/{id}",
    "/videos/generations/{id}",
    "/v1/video/generations/{id}",
    "/tasks/{id}",
    "/async-result/{id}",
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum CancelVerb {
    Delete,
    Post,
}

const CANCEL_PATHS: &[(CancelVerb, &str)] = &[
    (CancelVerb::Delete, "/video/generations/{id}"),
    (CancelVerb::Post, "/videos/generations/{id}/cancel"),
    (CancelVerb::Post, "/tasks/{id}/cancel"),
];

// ─────────────────────────────────────────────
// Extraction rules
// ─────────────────────────────────────────────

/// A named JSON pointer into a vendor response.
#[derive(Clone, Copy, Debug)]
pub struct ExtractRule {
    pub name: &'static str,
    pub pointer: &'static str,
}

const fn rule(name: &'static str, pointer: &'static str) -> ExtractRule {
    ExtractRule { name, pointer }
}

pub const TASK_ID_RULES: &[ExtractRule] = &[
    rule("id", "/id"),
    rule("task_id", "/task_id"),
    rule("data.id", "/data/id"),
    rule("data.task_id", "/data/task_id"),
];

pub const CREATE_URL_RULES: &[ExtractRule] = &[
    rule("video_url", "/video_url"),
    rule("url", "/url"),
    rule("data.url", "/data/url"),
];

pub const STATUS_RULES: &[ExtractRule] = &[
    rule("status", "/status"),
    rule("task_status", "/task_status"),
    rule("state", "/state"),
];

pub const STATUS_URL_RULES: &[ExtractRule] = &[
    rule("video_url", "/video_url"),
    rule("url", "/url"),
    rule("result.url", "/result/url"),
    rule("data.url", "/data/url"),
    rule("output.video_url", "/output/video_url"),
];

pub const MESSAGE_RULES: &[ExtractRule] = &[
    rule("message", "/message"),
    rule("error.message", "/error/message"),
    rule("error_message", "/error_message"),
];

/// Apply `rules` in order; the first non-empty string (or number) wins.
pub fn extract(resp: &Value, rules: &[ExtractRule]) -> Option<String> {
    rules.iter().find_map(|r| match resp.pointer(r.pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Fold the many status spellings seen in the wild onto the common set.
fn normalize_status(raw: &str) -> RemoteStatus {
    match raw.trim().to_lowercase().as_str() {
        "success" | "succeeded" | "completed" | "done" => RemoteStatus::Succeeded,
        "processing" | "running" | "pending" | "in_progress" => RemoteStatus::Running,
        "failed" | "error" | "fail" => RemoteStatus::Failed,
        "queued" | "waiting" => RemoteStatus::Queued,
        "cancelled" | "canceled" => RemoteStatus::Cancelled,
        other => RemoteStatus::Other(other.to_string()),
    }
}

fn sync_id(url: &str) -> String {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    format!("{SYNC_PREFIX}{:08x}", hasher.finish() & 0xFFFF_FFFF)
}

// ─────────────────────────────────────────────
// Adapter
// ─────────────────────────────────────────────

pub struct OpenAiCompatProvider {
    client: HttpClient,
    /// Synthetic ID -> video URL for gateways that answer synchronously.
    sync_results: Mutex<HashMap<String, String>>,
}

impl OpenAiCompatProvider {
    pub fn new(config: &AdapterConfig) -> Self {
        let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        info!(base_url = base, "openai-compatible adapter ready");
        Self {
            client: HttpClient::new(base, &config.api_key, &config.http),
            sync_results: Mutex::new(HashMap::new()),
        }
    }

    fn build_body(req: &CreateTaskRequest) -> Value {
        let mut body = json!({
            "model": req.model,
            "prompt": req.prompt,
            "duration": req.duration,
            "resolution": req.resolution,
            "fps": req.fps,
        });
        match (&req.first_frame, &req.last_frame) {
            (Some(first), Some(last)) => body["image"] = json!([first, last]),
            (Some(first), None) => body["image"] = json!(first),
            _ => {}
        }
        if let Some(audio) = &req.audio {
            body["audio"] = json!(audio);
        }
        // Extras (size, quality, style, music hints) pass through untouched.
        for (key, value) in &req.extra {
            if body.get(key).is_none() {
                body[key.as_str()] = value.clone();
            }
        }
        body
    }

    fn parse_status(resp: &Value) -> TaskStatusReport {
        let status = extract(resp, STATUS_RULES)
            .map(|s| normalize_status(&s))
            .unwrap_or_else(|| RemoteStatus::Other("unknown".into()));

        let reported = resp
            .get("progress")
            .and_then(Value::as_f64)
            .map(|p| p.clamp(0.0, 100.0) as u8)
            .unwrap_or(0);
        let progress = match status {
            RemoteStatus::Succeeded => 100,
            RemoteStatus::Running if reported == 0 => 50,
            RemoteStatus::Queued => 10,
            _ => reported,
        };

        TaskStatusReport::new(status)
            .with_progress(progress)
            .with_video_url(extract(resp, STATUS_URL_RULES))
            .with_message(extract(resp, MESSAGE_RULES))
    }
}

#[async_trait]
impl VideoProvider for OpenAiCompatProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn create_task(&self, request: &CreateTaskRequest) -> Result<String, ProviderError> {
        let req = self.coerce_request(request);
        let body = Self::build_body(&req);
        info!(model = %req.model, "openai-compatible create");
        debug!(body = %body, "openai-compatible request body");

        let mut last_error = String::from("no candidate endpoint answered");
        for path in CREATE_PATHS {
            let resp = match self.client.post(path, &body).await {
                Ok(resp) => resp,
                Err(HttpError::Status { status: 404, .. }) => {
                    debug!(path = path, "endpoint not found, trying next");
                    last_error = format!("{path}: HTTP 404");
                    continue;
                }
                Err(e @ HttpError::Status { .. }) => {
                    error!(path = path, error = %e, "openai-compatible create failed");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(path = path, error = %e, "endpoint unreachable, trying next");
                    last_error = format!("{path}: {e}");
                    continue;
                }
            };

            if let Some(id) = extract(&resp, TASK_ID_RULES) {
                info!(task_id = %id, path = path, "openai-compatible task created");
                return Ok(id);
            }
            if let Some(url) = extract(&resp, CREATE_URL_RULES) {
                let id = sync_id(&url);
                info!(task_id = %id, "gateway answered synchronously");
                self.sync_results.lock().await.insert(id.clone(), url);
                return Ok(id);
            }
            warn!(path = path, body = %resp, "response carried no task id");
            last_error = format!("{path}: response carried no task id");
        }

        error!(error = %last_error, "all create endpoints failed");
        Err(ProviderError::NoEndpoint(last_error))
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusReport, ProviderError> {
        if task_id.starts_with(SYNC_PREFIX) {
            // Handed out once; the caller is done with the task after this.
            if let Some(url) = self.sync_results.lock().await.remove(task_id) {
                return Ok(TaskStatusReport::new(RemoteStatus::Succeeded)
                    .with_progress(100)
                    .with_video_url(Some(url)));
            }
        }

        let mut last_error = String::from("unable to fetch task status");
        for template in STATUS_PATHS {
            let path = template.replace("{id}", task_id);
            match self.client.get(&path).await {
                Ok(resp) => return Ok(Self::parse_status(&resp)),
                Err(HttpError::Status { status: 404, .. }) => continue,
                Err(e @ HttpError::Status { .. }) => return Err(e.into()),
                Err(e) => {
                    last_error = format!("{path}: {e}");
                    continue;
                }
            }
        }
        Err(ProviderError::NoEndpoint(last_error))
    }

    async fn cancel_task(&self, task_id: &str) -> CancelOutcome {
        if task_id.starts_with(SYNC_PREFIX) {
            return CancelOutcome::rejected("synchronous results cannot be cancelled");
        }

        for (verb, template) in CANCEL_PATHS {
            let path = template.replace("{id}", task_id);
            let result = match verb {
                CancelVerb::Delete => self.client.delete(&path).await,
                CancelVerb::Post => self.client.post(&path, &json!({})).await,
            };
            match result {
                Ok(_) => {
                    info!(task_id = task_id, path = %path, "openai-compatible task cancelled");
                    return CancelOutcome::accepted("task cancelled");
                }
                Err(HttpError::Status { status: 404, .. }) => continue,
                Err(e @ HttpError::Status { .. }) => return CancelOutcome::rejected(e.to_string()),
                Err(e) => {
                    debug!(path = %path, error = %e, "cancel endpoint unreachable");
                    continue;
                }
            }
        }
        CancelOutcome::rejected("cancel failed: endpoint not supported")
    }
}
