//! Volcengine Ark (Doubao Seedance) adapter.
//!
//! - create: `POST /contents/generations/tasks` with a `content` array; the
//!   generation flags travel inside the text prompt (`--duration 5 ...`).
//! - status: `GET /contents/generations/tasks/{id}`
//! - cancel: `DELETE /contents/generations/tasks/{id}` (queued tasks only)

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::http::HttpClient;
use crate::registry::AdapterConfig;
use crate::traits::{
    CancelOutcome, CreateTaskRequest, ProviderError, RemoteStatus, TaskStatusReport,
    VideoProvider,
};

pub const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

const TASKS_PATH: &str = "/contents/generations/tasks";

pub struct VolcengineProvider {
    client: HttpClient,
}

impl VolcengineProvider {
    pub fn new(config: &AdapterConfig) -> Self {
        let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        info!(base_url = base, "volcengine adapter ready");
        Self {
            client: HttpClient::new(base, &config.api_key, &config.http),
        }
    }

    /// Build the request body. Expects an already-coerced request.
    fn build_body(req: &CreateTaskRequest) -> Value {
        let has_first = req.first_frame.is_some();
        let has_last = req.last_frame.is_some();
        let camera_fixed = req
            .extra
            .get("camera_fixed")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let mut text = format!(
            "{} --duration {} --watermark {}",
            req.prompt, req.duration, req.watermark
        );
        if has_first || has_last {
            text.push_str(" --ratio adaptive");
        }
        text.push_str(&format!(" --camerafixed {camera_fixed}"));

        let mut content = vec![json!({ "type": "text", "text": text })];
        if let Some(first) = &req.first_frame {
            let mut item = json!({ "type": "image_url", "image_url": { "url": first } });
            // The role is only needed to disambiguate a first+last pair.
            if has_last {
                item["role"] = json!("first_frame");
            }
            content.push(item);
        }
        if let Some(last) = &req.last_frame {
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": last },
                "role": "last_frame"
            }));
        }

        let mut body = json!({ "model": req.model, "content": content });
        if req.generate_audio {
            body["generate_audio"] = json!(true);
        }
        body
    }

    fn parse_status(resp: &Value) -> TaskStatusReport {
        let raw = resp.get("status").and_then(Value::as_str).unwrap_or("unknown");
        match raw {
            "succeeded" => TaskStatusReport::new(RemoteStatus::Succeeded)
                .with_progress(100)
                .with_video_url(
                    resp.pointer("/content/video_url")
                        .and_then(Value::as_str)
                        .map(String::from),
                ),
            "running" => TaskStatusReport::new(RemoteStatus::Running).with_progress(50),
            "queued" => TaskStatusReport::new(RemoteStatus::Queued).with_progress(10),
            "failed" => {
                let message = match resp.get("error") {
                    Some(Value::Object(e)) => e
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("generation failed")
                        .to_string(),
                    Some(Value::String(s)) if !s.is_empty() => s.clone(),
                    _ => "generation failed".to_string(),
                };
                TaskStatusReport::new(RemoteStatus::Failed).with_message(Some(message))
            }
            "cancelled" => TaskStatusReport::new(RemoteStatus::Cancelled)
                .with_message(Some("task cancelled".into())),
            "expired" => TaskStatusReport::new(RemoteStatus::Failed)
                .with_message(Some("task expired".into())),
            other => TaskStatusReport::new(RemoteStatus::parse(other)),
        }
    }
}

#[async_trait]
impl VideoProvider for VolcengineProvider {
    fn name(&self) -> &'static str {
        "volcengine"
    }

    async fn create_task(&self, request: &CreateTaskRequest) -> Result<String, ProviderError> {
        let req = self.coerce_request(request);
        let body = Self::build_body(&req);
        debug!(model = %req.model, body = %body, "volcengine create");

        let resp = self.client.post(TASKS_PATH, &body).await.map_err(|e| {
            error!(error = %e, "volcengine create failed");
            ProviderError::from(e)
        })?;

        match resp.get("id").and_then(Value::as_str).filter(|s| !s.is_empty()) {
            Some(id) => {
                info!(task_id = id, "volcengine task created");
                Ok(id.to_string())
            }
            None => Err(ProviderError::MissingTaskId {
                provider: self.name(),
                body: resp.to_string(),
            }),
        }
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusReport, ProviderError> {
        let resp = self.client.get(&format!("{TASKS_PATH}/{task_id}")).await?;
        let report = Self::parse_status(&resp);
        debug!(task_id = task_id, status = %report.status, "volcengine status");
        Ok(report)
    }

    async fn cancel_task(&self, task_id: &str) -> CancelOutcome {
        match self.client.delete(&format!("{TASKS_PATH}/{task_id}")).await {
            Ok(_) => {
                info!(task_id = task_id, "volcengine task cancelled");
                CancelOutcome::accepted("task cancelled")
            }
            Err(e) => {
                let msg = e.to_string();
                if msg.to_lowercase().contains("running") {
                    return CancelOutcome::rejected("running tasks cannot be cancelled");
                }
                error!(task_id = task_id, error = %e, "volcengine cancel failed");
                CancelOutcome::rejected(format!("cancel failed: {msg}"))
            }
        }
    }
}
