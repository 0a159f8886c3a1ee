//! Aliyun DashScope (Wanxiang) adapter.
//!
//! Creation must carry `X-DashScope-Async: enable`; the task ID comes back
//! under `output.task_id`. DashScope offers no cancel endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::http::HttpClient;
use crate::registry::AdapterConfig;
use crate::traits::{
    CancelOutcome, CreateTaskRequest, ProviderError, RemoteStatus, TaskStatusReport,
    VideoProvider,
};

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

const CREATE_PATH: &str = "/services/aigc/video-generation/video-synthesis";

pub struct AliyunProvider {
    client: HttpClient,
}

impl AliyunProvider {
    pub fn new(config: &AdapterConfig) -> Self {
        let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        info!(base_url = base, "aliyun adapter ready");
        Self {
            client: HttpClient::new(base, &config.api_key, &config.http),
        }
    }

    /// `720p` -> `720P`.
    fn api_resolution(resolution: &str) -> String {
        resolution.trim().to_uppercase()
    }

    fn build_body(req: &CreateTaskRequest) -> Value {
        let mut input = json!({ "prompt": req.prompt });
        if let Some(img) = &req.first_frame {
            input["img_url"] = json!(img);
        }
        if let Some(audio) = &req.audio {
            input["audio_url"] = json!(audio);
        }
        if let Some(neg) = req.extra_str("negative_prompt") {
            input["negative_prompt"] = json!(neg);
        }

        let mut parameters = json!({
            "resolution": Self::api_resolution(&req.resolution),
            "duration": req.duration,
            "prompt_extend": req.prompt_extend,
            "watermark": req.watermark,
        });
        if req.extra_flag("multi_shot") && req.model.contains("wan2.6") {
            parameters["shot_type"] = json!("multi");
        }

        json!({ "model": req.model, "input": input, "parameters": parameters })
    }

    fn parse_status(resp: &Value) -> TaskStatusReport {
        let output = resp.get("output").unwrap_or(&Value::Null);
        let raw = output
            .get("task_status")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");

        match raw {
            "SUCCEEDED" => TaskStatusReport::new(RemoteStatus::Succeeded)
                .with_progress(100)
                .with_video_url(output.get("video_url").and_then(Value::as_str).map(String::from)),
            "RUNNING" => TaskStatusReport::new(RemoteStatus::Running).with_progress(50),
            "SUSPENDED" => TaskStatusReport::new(RemoteStatus::Running),
            "PENDING" => TaskStatusReport::new(RemoteStatus::Queued).with_progress(10),
            "FAILED" => {
                let message = output
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("generation failed");
                let message = match output.get("code").and_then(Value::as_str) {
                    Some(code) if !code.is_empty() => format!("{code}: {message}"),
                    _ => message.to_string(),
                };
                TaskStatusReport::new(RemoteStatus::Failed).with_message(Some(message))
            }
            "CANCELED" | "CANCELLED" => TaskStatusReport::new(RemoteStatus::Cancelled),
            other => TaskStatusReport::new(RemoteStatus::parse(other)),
        }
    }
}

#[async_trait]
impl VideoProvider for AliyunProvider {
    fn name(&self) -> &'static str {
        "aliyun"
    }

    async fn create_task(&self, request: &CreateTaskRequest) -> Result<String, ProviderError> {
        let mut req = self.coerce_request(request);
        // DashScope has no last-frame input.
        req.last_frame = None;
        let body = Self::build_body(&req);
        let mode = if req.first_frame.is_some() { "image-to-video" } else { "text-to-video" };
        info!(model = %req.model, mode = mode, "aliyun create");
        debug!(body = %body, "aliyun request body");

        let mut headers = HeaderMap::new();
        headers.insert("X-DashScope-Async", HeaderValue::from_static("enable"));

        let resp = self
            .client
            .request(Method::POST, CREATE_PATH, Some(&body), None, Some(&headers))
            .await
            .map_err(|e| {
                error!(error = %e, "aliyun create failed");
                ProviderError::from(e)
            })?;

        match resp
            .pointer("/output/task_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            Some(id) => {
                info!(task_id = id, "aliyun task created");
                Ok(id.to_string())
            }
            None => Err(ProviderError::MissingTaskId {
                provider: self.name(),
                body: resp.to_string(),
            }),
        }
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusReport, ProviderError> {
        let resp = self.client.get(&format!("/tasks/{task_id}")).await?;
        let report = Self::parse_status(&resp);
        if report.status == RemoteStatus::Failed {
            error!(task_id = task_id, message = ?report.message, "aliyun task failed");
        }
        Ok(report)
    }

    async fn cancel_task(&self, _task_id: &str) -> CancelOutcome {
        CancelOutcome::rejected("Aliyun DashScope does not support cancelling tasks")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidgen_core::config::HttpConfig;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> AliyunProvider {
        AliyunProvider::new(&AdapterConfig {
            api_key: "ds-key".into(),
            base_url: Some(server.uri()),
            http: HttpConfig {
                max_retries: 0,
                ..HttpConfig::default()
            },
        })
    }

    fn request() -> CreateTaskRequest {
        CreateTaskRequest {
            model: "wan2.6-i2v-flash".into(),
            prompt: "cat jumps".into(),
            first_frame: Some("https://img/cat.png".into()),
            fps: 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_body_shape() {
        let mut req = request();
        req.audio = Some("https://a/bgm.mp3".into());
        req.extra.insert("negative_prompt".into(), json!("blurry"));
        req.extra.insert("multi_shot".into(), json!(true));

        let body = AliyunProvider::build_body(&req);
        assert_eq!(body["input"]["img_url"], "https://img/cat.png");
        assert_eq!(body["input"]["audio_url"], "https://a/bgm.mp3");
        assert_eq!(body["input"]["negative_prompt"], "blurry");
        assert_eq!(body["parameters"]["resolution"], "720P");
        assert_eq!(body["parameters"]["shot_type"], "multi");
        assert_eq!(body["parameters"]["prompt_extend"], true);
    }

    #[test]
    fn test_multi_shot_only_for_wan26() {
        let mut req = request();
        req.model = "wan2.5-i2v-plus".into();
        req.extra.insert("multi_shot".into(), json!(true));
        let body = AliyunProvider::build_body(&req);
        assert!(body["parameters"].get("shot_type").is_none());
    }

    #[test]
    fn test_parse_status() {
        let ok = AliyunProvider::parse_status(&json!({
            "output": {"task_status": "SUCCEEDED", "video_url": "https://oss/v.mp4"}
        }));
        assert_eq!(ok.status, RemoteStatus::Succeeded);
        assert_eq!(ok.video_url.as_deref(), Some("https://oss/v.mp4"));

        let pending = AliyunProvider::parse_status(&json!({"output": {"task_status": "PENDING"}}));
        assert_eq!((pending.status, pending.progress), (RemoteStatus::Queued, 10));

        let suspended =
            AliyunProvider::parse_status(&json!({"output": {"task_status": "SUSPENDED"}}));
        assert_eq!(suspended.status, RemoteStatus::Running);

        let failed = AliyunProvider::parse_status(&json!({
            "output": {"task_status": "FAILED", "code": "DataInspectionFailed", "message": "bad input"}
        }));
        assert_eq!(failed.message.as_deref(), Some("DataInspectionFailed: bad input"));

        let unknown = AliyunProvider::parse_status(&json!({}));
        assert!(!unknown.status.is_terminal());
    }

    #[tokio::test]
    async fn test_create_task_sends_async_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/aigc/video-generation/video-synthesis"))
            .and(header("X-DashScope-Async", "enable"))
            .and(body_partial_json(json!({
                "model": "wan2.6-i2v-flash",
                "parameters": {"duration": 5}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": {"task_id": "ds-42", "task_status": "PENDING"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = provider(&server).create_task(&request()).await.unwrap();
        assert_eq!(id, "ds-42");
    }

    #[tokio::test]
    async fn test_get_task_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/ds-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": {"task_status": "RUNNING"}
            })))
            .mount(&server)
            .await;

        let report = provider(&server).get_task_status("ds-42").await.unwrap();
        assert_eq!(report.status, RemoteStatus::Running);
        assert_eq!(report.progress, 50);
    }

    #[tokio::test]
    async fn test_cancel_unsupported() {
        let server = MockServer::start().await;
        let outcome = provider(&server).cancel_task("ds-42").await;
        assert!(!outcome.ok);
        assert!(outcome.message.contains("does not support"));
    }
}
