//! Zhipu CogVideoX adapter.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::http::HttpClient;
use crate::registry::AdapterConfig;
use crate::traits::{
    CancelOutcome, CreateTaskRequest, ProviderError, RemoteStatus, TaskStatusReport,
    VideoProvider,
};

pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api";

const CREATE_PATH: &str = "/paas/v4/videos/generations";

/// Preset name to pixel size. Unknown presets fall back to 1080p.
fn api_size(resolution: &str) -> &'static str {
    match resolution.trim().to_lowercase().as_str() {
        "720p" => "1280x720",
        "1080p" => "1920x1080",
        "4k" => "3840x2160",
        _ => "1920x1080",
    }
}

pub struct ZhipuProvider {
    client: HttpClient,
}

impl ZhipuProvider {
    pub fn new(config: &AdapterConfig) -> Self {
        let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        info!(base_url = base, "zhipu adapter ready");
        Self {
            client: HttpClient::new(base, &config.api_key, &config.http),
        }
    }

    fn build_body(req: &CreateTaskRequest) -> Value {
        let mut body = json!({
            "model": req.model,
            "prompt": req.prompt,
            "size": api_size(&req.resolution),
            "fps": req.fps,
            "duration": req.duration,
            "with_audio": req.generate_audio,
            "quality": req.extra_str("quality").unwrap_or("speed"),
            "watermark_enabled": req.watermark,
        });

        // A single image is a string; a first+last pair is an array.
        match (&req.first_frame, &req.last_frame) {
            (Some(first), Some(last)) => body["image_url"] = json!([first, last]),
            (Some(first), None) => body["image_url"] = json!(first),
            _ => {}
        }

        for key in ["user_id", "request_id"] {
            if let Some(v) = req.extra_str(key) {
                body[key] = json!(v);
            }
        }
        body
    }

    fn parse_status(resp: &Value) -> TaskStatusReport {
        match resp.get("task_status").and_then(Value::as_str).unwrap_or("UNKNOWN") {
            "SUCCESS" => TaskStatusReport::new(RemoteStatus::Succeeded)
                .with_progress(100)
                .with_video_url(
                    resp.pointer("/video_result/0/url")
                        .and_then(Value::as_str)
                        .map(String::from),
                ),
            "PROCESSING" => TaskStatusReport::new(RemoteStatus::Running).with_progress(50),
            "FAIL" => TaskStatusReport::new(RemoteStatus::Failed).with_message(Some(
                resp.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("generation failed")
                    .to_string(),
            )),
            other => TaskStatusReport::new(RemoteStatus::parse(other)),
        }
    }
}

#[async_trait]
impl VideoProvider for ZhipuProvider {
    fn name(&self) -> &'static str {
        "zhipu"
    }

    async fn create_task(&self, request: &CreateTaskRequest) -> Result<String, ProviderError> {
        let req = self.coerce_request(request);
        let body = Self::build_body(&req);
        info!(
            model = %req.model,
            first_frame = req.first_frame.is_some(),
            last_frame = req.last_frame.is_some(),
            "zhipu create"
        );
        debug!(body = %body, "zhipu request body");

        let resp = self.client.post(CREATE_PATH, &body).await.map_err(|e| {
            error!(error = %e, "zhipu create failed");
            ProviderError::from(e)
        })?;

        let Some(id) = resp.get("id").and_then(Value::as_str).filter(|s| !s.is_empty()) else {
            return Err(ProviderError::MissingTaskId {
                provider: self.name(),
                body: resp.to_string(),
            });
        };
        let status = resp.get("task_status").and_then(Value::as_str).unwrap_or("");
        info!(task_id = id, status = status, "zhipu task created");
        Ok(id.to_string())
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusReport, ProviderError> {
        let resp = self
            .client
            .get(&format!("/paas/v4/async-result/{task_id}"))
            .await?;
        Ok(Self::parse_status(&resp))
    }

    async fn cancel_task(&self, _task_id: &str) -> CancelOutcome {
        CancelOutcome::rejected("Zhipu CogVideoX does not support cancelling tasks")
    }
}
