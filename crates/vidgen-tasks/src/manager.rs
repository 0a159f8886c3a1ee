//! Task manager: single-worker queue that drives tasks from submission to
//! a terminal state.
//!
//! Architecture:
//! - One mutex guards the queue, the running slot, the completed map and the
//!   poller, so a task is only ever visible in one of them
//! - `run_once()` is one scheduler step: dequeue + submit, or check the
//!   running task; it returns how long to sleep before the next step
//! - `start()` spawns a loop around `run_once()`; `stop()` signals it and
//!   waits for it to exit
//! - Terminal transitions archive the task and notify the chat exactly once

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vidgen_core::config::{Config, PollerConfig, QueueConfig};
use vidgen_core::music::is_valid_music_style;
use vidgen_providers::{CancelOutcome, RemoteStatus, VideoGenerator};

use crate::downloader::VideoDownloader;
use crate::notify::{
    cancelled_text, failure_text, manual_download_text, success_text, timeout_text, ChatSender,
    Delivery, MISSING_URL_TEXT,
};
use crate::poller::SmartPoller;
use crate::types::{StatusSnapshot, Task, TaskRequest, TaskStatus, TaskSummary};

/// Progress shown once a task leaves the queue.
const STARTED_PROGRESS: u8 = 5;
/// Progress shown once the provider accepted the task.
const ACCEPTED_PROGRESS: u8 = 15;
/// Floor while the provider still reports the task as queued.
const REMOTE_QUEUED_PROGRESS: u8 = 10;
/// Ceiling for anything short of success.
const MAX_RUNNING_PROGRESS: u8 = 95;
/// Remote progress at which polling snaps back to the fast interval.
const FAST_POLL_THRESHOLD: u8 = 80;

/// Time-based progress floor: `15 + 80 * min(1, elapsed / (timeout * 0.8))`.
pub fn estimate_progress(elapsed: Duration, timeout: Duration) -> u8 {
    let window = timeout.as_secs_f64() * 0.8;
    let ratio = if window > 0.0 {
        (elapsed.as_secs_f64() / window).min(1.0)
    } else {
        1.0
    };
    (15.0 + 80.0 * ratio).min(f64::from(MAX_RUNNING_PROGRESS)) as u8
}

// ─────────────────────────────────────────────
// State
// ─────────────────────────────────────────────

struct State {
    queue: VecDeque<Task>,
    running: Option<Task>,
    completed: HashMap<String, Task>,
    poller: SmartPoller,
}

impl State {
    /// Stamp completion and move into the completed map. Returns a copy for
    /// notification.
    fn archive(&mut self, mut task: Task) -> Task {
        task.completed_at = Some(Utc::now());
        let copy = task.clone();
        self.completed.insert(task.id.clone(), task);
        copy
    }

    /// Vacate the running slot with a terminal status.
    fn finish_running(&mut self, status: TaskStatus, error: Option<String>) -> Option<Task> {
        let mut task = self.running.take()?;
        task.status = status;
        if error.is_some() {
            task.error = error;
        }
        self.poller.reset();
        Some(self.archive(task))
    }
}

type Worker = (JoinHandle<()>, Arc<Notify>);

// ─────────────────────────────────────────────
// TaskManager
// ─────────────────────────────────────────────

pub struct TaskManager {
    generator: Arc<VideoGenerator>,
    downloader: VideoDownloader,
    sender: Option<Arc<dyn ChatSender>>,
    config: QueueConfig,
    state: Mutex<State>,
    worker: Mutex<Option<Worker>>,
}

impl TaskManager {
    pub fn new(
        generator: Arc<VideoGenerator>,
        downloader: VideoDownloader,
        config: QueueConfig,
        poller: &PollerConfig,
    ) -> Self {
        Self {
            generator,
            downloader,
            sender: None,
            config,
            state: Mutex::new(State {
                queue: VecDeque::new(),
                running: None,
                completed: HashMap::new(),
                poller: SmartPoller::from(poller),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config, generator: Arc<VideoGenerator>) -> Self {
        Self::new(
            generator,
            VideoDownloader::new(&config.download),
            config.queue.clone(),
            &config.poller,
        )
    }

    /// Where terminal-state notifications go.
    pub fn with_sender(mut self, sender: Arc<dyn ChatSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn generator(&self) -> &Arc<VideoGenerator> {
        &self.generator
    }

    fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.config.task_timeout)
    }

    // ─────────────────────────────────────────
    // Submission & introspection
    // ─────────────────────────────────────────

    /// Queue a task without touching the scheduler. `None` when the queue
    /// is full.
    pub async fn enqueue(&self, mut request: TaskRequest) -> Option<String> {
        if request.music.enabled {
            if let Some(style) = request.music.style.as_deref() {
                if !is_valid_music_style(style) {
                    warn!(style = style, "unknown music style, ignoring");
                    request.music.style = None;
                }
            }
        }
        request.music.volume = request.music.volume.clamp(0.0, 1.0);

        let model_id = request
            .model_id
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.generator.current_model());

        let mut state = self.state.lock().await;
        if state.queue.len() >= self.config.max_queue_size {
            warn!(queued = state.queue.len(), "queue full, task rejected");
            return None;
        }

        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let task = Task::new(id.clone(), model_id, request);
        info!(
            task_id = %id,
            kind = task.kind.label(),
            model_id = %task.model_id,
            position = state.queue.len() + 1,
            "task queued"
        );
        state.queue.push_back(task);
        Some(id)
    }

    /// Queue a task and make sure the scheduler is running.
    pub async fn submit_task(self: &Arc<Self>, request: TaskRequest) -> Option<String> {
        let id = self.enqueue(request).await?;
        self.start().await;
        Some(id)
    }

    pub async fn get_task(&self, id: &str) -> Option<Task> {
        let state = self.state.lock().await;
        state
            .running
            .iter()
            .chain(state.queue.iter())
            .find(|t| t.id == id)
            .or_else(|| state.completed.get(id))
            .cloned()
    }

    /// 1-based position in the queue, 0 when not queued.
    pub async fn get_queue_position(&self, id: &str) -> usize {
        let state = self.state.lock().await;
        state
            .queue
            .iter()
            .position(|t| t.id == id)
            .map(|p| p + 1)
            .unwrap_or(0)
    }

    pub async fn get_all_status(&self) -> StatusSnapshot {
        let state = self.state.lock().await;
        StatusSnapshot {
            running: state.running.iter().map(TaskSummary::from).collect(),
            queued: state.queue.iter().map(TaskSummary::from).collect(),
            completed: state.completed.len(),
        }
    }

    /// Drop completed tasks older than `max_age`. Returns how many went.
    pub async fn cleanup_completed(&self, max_age: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };
        let mut state = self.state.lock().await;
        let before = state.completed.len();
        state
            .completed
            .retain(|_, t| t.completed_at.map(|at| at >= cutoff).unwrap_or(true));
        let removed = before - state.completed.len();
        if removed > 0 {
            debug!(removed = removed, "cleaned up completed tasks");
        }
        removed
    }

    // ─────────────────────────────────────────
    // Cancellation
    // ─────────────────────────────────────────

    pub async fn cancel_task(&self, id: &str) -> CancelOutcome {
        let mut state = self.state.lock().await;

        if let Some(pos) = state.queue.iter().position(|t| t.id == id) {
            let Some(mut task) = state.queue.remove(pos) else {
                return CancelOutcome::rejected("task not found");
            };
            task.status = TaskStatus::Cancelled;
            let done = state.archive(task);
            drop(state);
            info!(task_id = %id, "queued task cancelled");
            self.complete(done).await;
            return CancelOutcome::accepted("task cancelled");
        }

        let (remote_id, model_id) = match state.running.as_ref() {
            Some(t) if t.id == id => match &t.remote_id {
                Some(remote) => (remote.clone(), t.model_id.clone()),
                None => return CancelOutcome::rejected("task is still being submitted, try again shortly"),
            },
            _ if state.completed.contains_key(id) => {
                return CancelOutcome::rejected("task already finished");
            }
            _ => return CancelOutcome::rejected("task not found"),
        };

        // The lock stays held so the scheduler cannot complete the task
        // underneath the remote cancel.
        let outcome = self.generator.cancel(&remote_id, &model_id).await;
        if !outcome.ok {
            warn!(task_id = %id, message = %outcome.message, "remote cancel refused");
            return outcome;
        }

        let done = state.finish_running(TaskStatus::Cancelled, None);
        drop(state);
        info!(task_id = %id, remote_id = %remote_id, "running task cancelled");
        if let Some(task) = done {
            self.complete(task).await;
        }
        CancelOutcome::accepted(outcome.message)
    }

    // ─────────────────────────────────────────
    // Scheduler
    // ─────────────────────────────────────────

    /// Spawn the scheduler loop. Does nothing if it is already running.
    pub async fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|(handle, _)| !handle.is_finished()) {
            return;
        }

        let shutdown = Arc::new(Notify::new());
        let this = Arc::clone(self);
        let signal = Arc::clone(&shutdown);
        let handle = tokio::spawn(async move { this.run(signal).await });
        *worker = Some((handle, shutdown));
        info!("task scheduler started");
    }

    /// Signal the loop and wait for it to exit.
    pub async fn stop(&self) {
        let Some((handle, shutdown)) = self.worker.lock().await.take() else {
            return;
        };
        info!("stopping task scheduler");
        shutdown.notify_one();
        if let Err(e) = handle.await {
            error!(error = %e, "task scheduler exited abnormally");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|(handle, _)| !handle.is_finished())
    }

    async fn run(&self, shutdown: Arc<Notify>) {
        loop {
            let delay = self.run_once().await;
            debug!(sleep_ms = delay.as_millis() as u64, "scheduler sleeping");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.notified() => {
                    info!("task scheduler shutting down");
                    return;
                }
            }
        }
    }

    /// One scheduler iteration. Returns the delay before the next one.
    pub async fn run_once(&self) -> Duration {
        let has_running = self.state.lock().await.running.is_some();
        if has_running {
            self.check_running().await;
        } else {
            self.process_next().await;
        }

        let idle = {
            let mut state = self.state.lock().await;
            if state.running.is_some() || !state.queue.is_empty() {
                return state.poller.interval();
            }
            state.poller.reset();
            true
        };
        if idle && self.config.auto_cleanup {
            self.cleanup_completed(Duration::from_secs(self.config.cleanup_delay))
                .await;
        }
        Duration::from_secs(self.config.poll_interval)
    }

    /// Move the queue head into the running slot and submit it.
    async fn process_next(&self) {
        let (id, request) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            if state.running.is_some() {
                return;
            }
            let Some(mut task) = state.queue.pop_front() else {
                return;
            };
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
            task.progress = task.progress.max(STARTED_PROGRESS);
            state.poller.reset();
            let out = (task.id.clone(), task.generate_request());
            info!(task_id = %task.id, remaining = state.queue.len(), "task started");
            state.running = Some(task);
            out
        };

        let result = self.generator.generate(request).await;

        let mut state = self.state.lock().await;
        if state.running.as_ref().map(|t| t.id.as_str()) != Some(id.as_str()) {
            return;
        }
        match result {
            Ok(submission) => {
                if let Some(task) = state.running.as_mut() {
                    info!(task_id = %id, remote_id = %submission.remote_id, "task submitted");
                    task.remote_id = Some(submission.remote_id);
                    task.progress = task.progress.max(ACCEPTED_PROGRESS);
                }
            }
            Err(e) => {
                error!(task_id = %id, error = %e, "task submission failed");
                let done = state.finish_running(TaskStatus::Failed, Some(e.to_string()));
                drop(state);
                if let Some(task) = done {
                    self.complete(task).await;
                }
            }
        }
    }

    /// Timeout check, progress estimate, then one status poll.
    async fn check_running(&self) {
        let timeout = self.task_timeout();
        let (id, remote_id, model_id) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let Some(task) = state.running.as_mut() else {
                return;
            };
            let Some(remote_id) = task.remote_id.clone() else {
                return;
            };
            let elapsed = task
                .started_at
                .and_then(|at| (Utc::now() - at).to_std().ok())
                .unwrap_or_default();

            if elapsed > timeout {
                warn!(task_id = %task.id, elapsed_secs = elapsed.as_secs(), "task timed out");
                let message = format!("timed out after {}s", timeout.as_secs());
                let done = state.finish_running(TaskStatus::Timeout, Some(message));
                drop(guard);
                if let Some(task) = done {
                    self.complete(task).await;
                }
                return;
            }

            task.progress = task.progress.max(estimate_progress(elapsed, timeout));
            (task.id.clone(), remote_id, task.model_id.clone())
        };

        let result = self.generator.task_status(&remote_id, &model_id).await;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(task) = state.running.as_mut().filter(|t| t.id == id) else {
            debug!(task_id = %id, "task left the running slot during poll");
            return;
        };
        task.poll_count += 1;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!(task_id = %id, error = %e, "status query failed, will retry");
                state.poller.advance();
                return;
            }
        };
        debug!(
            task_id = %id,
            status = %report.status,
            progress = report.progress,
            polls = task.poll_count,
            "task polled"
        );

        let done = match report.status {
            RemoteStatus::Succeeded => {
                task.video_url = report.video_url;
                task.progress = 100;
                info!(task_id = %id, "task succeeded");
                state.finish_running(TaskStatus::Succeeded, None)
            }
            RemoteStatus::Failed | RemoteStatus::Error => {
                let message = report
                    .message
                    .unwrap_or_else(|| "generation failed".to_string());
                warn!(task_id = %id, error = %message, "task failed");
                state.finish_running(TaskStatus::Failed, Some(message))
            }
            RemoteStatus::Cancelled => {
                info!(task_id = %id, "task cancelled remotely");
                state.finish_running(TaskStatus::Cancelled, None)
            }
            RemoteStatus::Running => {
                let reported = report.progress.min(MAX_RUNNING_PROGRESS);
                task.progress = task.progress.max(reported);
                if task.progress >= FAST_POLL_THRESHOLD {
                    state.poller.fast_poll();
                } else {
                    state.poller.advance();
                }
                None
            }
            RemoteStatus::Queued => {
                task.progress = task.progress.max(REMOTE_QUEUED_PROGRESS);
                state.poller.advance();
                None
            }
            RemoteStatus::Other(ref raw) => {
                debug!(task_id = %id, status = %raw, "unrecognised remote status");
                state.poller.advance();
                None
            }
        };

        drop(guard);
        if let Some(task) = done {
            self.complete(task).await;
        }
    }

    // ─────────────────────────────────────────
    // Notification
    // ─────────────────────────────────────────

    /// Notify the chat and record the local file, if any.
    async fn complete(&self, task: Task) {
        info!(task_id = %task.id, status = %task.status, "task completed");
        let Some(path) = self.notify(&task).await else {
            return;
        };
        let mut state = self.state.lock().await;
        if let Some(done) = state.completed.get_mut(&task.id) {
            done.local_path = Some(path);
        }
    }

    async fn notify(&self, task: &Task) -> Option<PathBuf> {
        let sender = self.sender.as_ref()?;
        let chat_id = task.chat_id.as_deref().filter(|c| !c.is_empty())?;
        let model_name = self
            .generator
            .model_config(&task.model_id)
            .map(|m| m.display_name().to_string())
            .unwrap_or_else(|| task.model_id.clone());

        match task.status {
            TaskStatus::Succeeded => {
                send(sender, chat_id, Delivery::Text(success_text(task, &model_name))).await;
                let Some(url) = task.video_url.as_deref() else {
                    send(sender, chat_id, Delivery::Text(MISSING_URL_TEXT.to_string())).await;
                    return None;
                };
                match self.downloader.download(url, None).await {
                    Ok(path) => {
                        if !send(sender, chat_id, Delivery::File(path.clone())).await {
                            send_url(sender, chat_id, url).await;
                        }
                        Some(path)
                    }
                    Err(e) => {
                        warn!(task_id = %task.id, error = %e, "video download failed, sending link");
                        send_url(sender, chat_id, url).await;
                        None
                    }
                }
            }
            TaskStatus::Failed => {
                send(sender, chat_id, Delivery::Text(failure_text(task, &model_name))).await;
                None
            }
            TaskStatus::Timeout => {
                send(sender, chat_id, Delivery::Text(timeout_text(task))).await;
                None
            }
            TaskStatus::Cancelled => {
                send(sender, chat_id, Delivery::Text(cancelled_text(task))).await;
                None
            }
            TaskStatus::Queued | TaskStatus::Running => None,
        }
    }
}

/// Send and log failures. Returns whether delivery succeeded.
async fn send(sender: &Arc<dyn ChatSender>, chat_id: &str, delivery: Delivery) -> bool {
    match sender.send(chat_id, delivery).await {
        Ok(()) => true,
        Err(e) => {
            error!(chat_id = chat_id, error = %e, "failed to send notification");
            false
        }
    }
}

/// Video link, falling back to a plain-text link.
async fn send_url(sender: &Arc<dyn ChatSender>, chat_id: &str, url: &str) {
    if !send(sender, chat_id, Delivery::VideoUrl(url.to_string())).await {
        send(sender, chat_id, Delivery::Text(manual_download_text(url))).await;
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use vidgen_core::config::{DownloadConfig, HttpConfig, ModelConfig};
    use vidgen_providers::{
        CreateTaskRequest, ProviderError, TaskStatusReport, VideoProvider,
    };

    use crate::types::MusicOptions;

    const SEEDANCE: &str = "doubao-seedance-1-5-pro-251215";

    /// Scripted provider: status replies are popped in order, then it
    /// reports `running` forever.
    #[derive(Default)]
    struct MockProvider {
        creates: StdMutex<Vec<CreateTaskRequest>>,
        statuses: StdMutex<VecDeque<Result<TaskStatusReport, ProviderError>>>,
        status_calls: AtomicUsize,
        cancel_calls: AtomicUsize,
        fail_create: bool,
        refuse_cancel: bool,
    }

    impl MockProvider {
        fn script(self, replies: Vec<Result<TaskStatusReport, ProviderError>>) -> Self {
            *self.statuses.lock().unwrap() = replies.into();
            self
        }
    }

    #[async_trait]
    impl VideoProvider for MockProvider {
        fn name(&self) -> &'static str {
            "volcengine"
        }

        async fn create_task(&self, request: &CreateTaskRequest) -> Result<String, ProviderError> {
            let req = self.coerce_request(request);
            self.creates.lock().unwrap().push(req);
            if self.fail_create {
                return Err(ProviderError::NoEndpoint("quota exceeded".into()));
            }
            Ok(format!("remote-{}", self.creates.lock().unwrap().len()))
        }

        async fn get_task_status(&self, _: &str) -> Result<TaskStatusReport, ProviderError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(running(50)))
        }

        async fn cancel_task(&self, _: &str) -> CancelOutcome {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if self.refuse_cancel {
                CancelOutcome::rejected("running tasks cannot be cancelled")
            } else {
                CancelOutcome::accepted("cancelled")
            }
        }
    }

    /// Records deliveries; optionally fails for some delivery kinds.
    #[derive(Default)]
    struct RecordingSender {
        sent: StdMutex<Vec<(String, Delivery)>>,
        fail_files: bool,
        fail_urls: bool,
    }

    impl RecordingSender {
        fn deliveries(&self) -> Vec<Delivery> {
            self.sent.lock().unwrap().iter().map(|(_, d)| d.clone()).collect()
        }
    }

    #[async_trait]
    impl ChatSender for RecordingSender {
        async fn send(&self, chat_id: &str, delivery: Delivery) -> anyhow::Result<()> {
            let fail = match &delivery {
                Delivery::File(_) => self.fail_files,
                Delivery::VideoUrl(_) => self.fail_urls,
                Delivery::Text(_) => false,
            };
            self.sent.lock().unwrap().push((chat_id.to_string(), delivery));
            if fail {
                anyhow::bail!("upload rejected");
            }
            Ok(())
        }
    }

    fn running(progress: u8) -> TaskStatusReport {
        TaskStatusReport::new(RemoteStatus::Running).with_progress(progress)
    }

    fn generator(provider: Arc<MockProvider>) -> Arc<VideoGenerator> {
        let mut models = BTreeMap::new();
        models.insert(
            "model1".to_string(),
            ModelConfig {
                name: "Seedance".into(),
                format: "volcengine".into(),
                api_key: "ark".into(),
                model: SEEDANCE.into(),
                ..ModelConfig::default()
            },
        );
        Arc::new(
            VideoGenerator::new(models, "model1", HttpConfig::default())
                .with_provider("model1", provider),
        )
    }

    fn manager(provider: Arc<MockProvider>, dir: &TempDir) -> TaskManager {
        manager_with(provider, dir, QueueConfig::default())
    }

    fn manager_with(provider: Arc<MockProvider>, dir: &TempDir, queue: QueueConfig) -> TaskManager {
        let downloader = VideoDownloader::new(&DownloadConfig {
            dir: dir.path().to_string_lossy().into_owned(),
            timeout: 5,
            ..DownloadConfig::default()
        });
        TaskManager::new(generator(provider), downloader, queue, &PollerConfig::default())
    }

    fn request(prompt: &str) -> TaskRequest {
        TaskRequest {
            prompt: prompt.into(),
            resolution: "720p".into(),
            fps: 24,
            duration: 5,
            chat_id: Some("chat-1".into()),
            ..Default::default()
        }
    }

    async fn set_progress(mgr: &TaskManager, progress: u8) {
        mgr.state.lock().await.running.as_mut().unwrap().progress = progress;
    }

    async fn rewind_start(mgr: &TaskManager, secs: i64) {
        let mut state = mgr.state.lock().await;
        let task = state.running.as_mut().unwrap();
        task.started_at = Some(Utc::now() - chrono::Duration::seconds(secs));
    }

    // ── Progress estimate ──

    #[test]
    fn test_estimate_progress() {
        let timeout = Duration::from_secs(600);
        assert_eq!(estimate_progress(Duration::ZERO, timeout), 15);
        assert_eq!(estimate_progress(Duration::from_secs(240), timeout), 55);
        assert_eq!(estimate_progress(Duration::from_secs(480), timeout), 95);
        assert_eq!(estimate_progress(Duration::from_secs(9999), timeout), 95);
        assert_eq!(estimate_progress(Duration::from_secs(1), Duration::ZERO), 95);
    }

    // ── Queue ──

    #[tokio::test]
    async fn test_enqueue_fifo_and_position() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(Arc::new(MockProvider::default()), &dir);

        let a = mgr.enqueue(request("a")).await.unwrap();
        let b = mgr.enqueue(request("b")).await.unwrap();
        assert_eq!(a.len(), 8);
        assert_eq!(mgr.get_queue_position(&a).await, 1);
        assert_eq!(mgr.get_queue_position(&b).await, 2);
        assert_eq!(mgr.get_queue_position("nope").await, 0);

        let task = mgr.get_task(&a).await.unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.model_id, "model1");
    }

    #[tokio::test]
    async fn test_queue_capacity() {
        let dir = TempDir::new().unwrap();
        let mgr = manager_with(
            Arc::new(MockProvider::default()),
            &dir,
            QueueConfig {
                max_queue_size: 2,
                ..QueueConfig::default()
            },
        );
        assert!(mgr.enqueue(request("a")).await.is_some());
        assert!(mgr.enqueue(request("b")).await.is_some());
        assert!(mgr.enqueue(request("c")).await.is_none());
        assert_eq!(mgr.get_all_status().await.queued.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_music_style_dropped() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(Arc::new(MockProvider::default()), &dir);
        let mut req = request("a");
        req.music = MusicOptions {
            enabled: true,
            style: Some("polka".into()),
            volume: 3.0,
        };
        let id = mgr.enqueue(req).await.unwrap();
        let task = mgr.get_task(&id).await.unwrap();
        assert!(task.music.style.is_none());
        assert_eq!(task.music.volume, 1.0);
    }

    // ── Submission ──

    #[tokio::test]
    async fn test_scenario_request_passes_unmodified() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default());
        let mgr = manager(provider.clone(), &dir);

        let id = mgr.enqueue(request("a fox in snow")).await.unwrap();
        mgr.run_once().await;

        let seen = provider.creates.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].duration, 5);
        assert_eq!(seen[0].fps, 24);
        assert_eq!(seen[0].resolution, "720p");
        assert_eq!(seen[0].model, SEEDANCE);

        let task = mgr.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.remote_id.as_deref(), Some("remote-1"));
        assert_eq!(task.progress, ACCEPTED_PROGRESS);
        assert!(task.started_at.is_some());
    }

    #[tokio::test]
    async fn test_scenario_duration_coerced_to_nearest() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default());
        let mgr = manager(provider.clone(), &dir);

        let mut req = request("a fox in snow");
        req.duration = 7;
        mgr.enqueue(req).await.unwrap();
        mgr.run_once().await;

        assert_eq!(provider.creates.lock().unwrap()[0].duration, 5);
    }

    #[tokio::test]
    async fn test_submission_failure_fails_task_and_notifies() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider {
            fail_create: true,
            ..Default::default()
        });
        let sender = Arc::new(RecordingSender::default());
        let mgr = manager(provider, &dir).with_sender(sender.clone());

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;

        let task = mgr.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("quota exceeded"));
        assert!(task.completed_at.is_some());

        let sent = sender.deliveries();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Delivery::Text(t) if t.contains("failed")));
    }

    #[tokio::test]
    async fn test_queue_continues_after_failure() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider {
            fail_create: true,
            ..Default::default()
        });
        let mgr = manager(provider.clone(), &dir);

        mgr.enqueue(request("a")).await.unwrap();
        mgr.enqueue(request("b")).await.unwrap();
        let delay = mgr.run_once().await;
        assert_eq!(delay, Duration::from_secs(2));
        mgr.run_once().await;

        assert_eq!(provider.creates.lock().unwrap().len(), 2);
        let status = mgr.get_all_status().await;
        assert!(status.running.is_empty());
        assert!(status.queued.is_empty());
        assert_eq!(status.completed, 2);
    }

    // ── Polling ──

    #[tokio::test]
    async fn test_scenario_progress_never_regresses() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default().script(vec![Ok(running(40))]));
        let mgr = manager(provider, &dir);

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;
        set_progress(&mgr, 60).await;
        mgr.run_once().await;

        let task = mgr.get_task(&id).await.unwrap();
        assert_eq!(task.progress, 60);
        assert_eq!(task.poll_count, 1);
        assert_eq!(task.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_progress_monotonic_across_polls() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default().script(vec![
            Ok(TaskStatusReport::new(RemoteStatus::Queued)),
            Ok(running(30)),
            Err(ProviderError::NoEndpoint("flaky".into())),
            Ok(running(20)),
            Ok(running(99)),
            Ok(TaskStatusReport::new(RemoteStatus::Other("paused".into()))),
        ]));
        let mgr = manager(provider, &dir);

        let id = mgr.enqueue(request("a")).await.unwrap();
        let mut last = 0;
        for _ in 0..7 {
            mgr.run_once().await;
            let progress = mgr.get_task(&id).await.unwrap().progress;
            assert!(progress >= last, "{progress} < {last}");
            last = progress;
        }
        assert_eq!(last, MAX_RUNNING_PROGRESS);
        assert_eq!(mgr.get_task(&id).await.unwrap().status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_poll_backoff_and_fast_poll() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default().script(vec![
            Ok(running(20)),
            Ok(running(30)),
            Ok(running(85)),
        ]));
        let mgr = manager(provider, &dir);

        mgr.enqueue(request("a")).await.unwrap();
        assert_eq!(mgr.run_once().await, Duration::from_secs(2));
        assert_eq!(mgr.run_once().await, Duration::from_secs(3));
        assert_eq!(mgr.run_once().await, Duration::from_secs_f64(4.5));
        assert_eq!(mgr.run_once().await, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_transient_poll_error_keeps_running_silently() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            MockProvider::default().script(vec![Err(ProviderError::NoEndpoint("down".into()))]),
        );
        let sender = Arc::new(RecordingSender::default());
        let mgr = manager(provider, &dir).with_sender(sender.clone());

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;
        mgr.run_once().await;

        assert_eq!(mgr.get_task(&id).await.unwrap().status, TaskStatus::Running);
        assert!(sender.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_records_message() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default().script(vec![Ok(
            TaskStatusReport::new(RemoteStatus::Failed).with_message(Some("nsfw prompt".into())),
        )]));
        let mgr = manager(provider, &dir);

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;
        mgr.run_once().await;

        let task = mgr.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("nsfw prompt"));
    }

    #[tokio::test]
    async fn test_remote_error_fails_task() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default().script(vec![Ok(
            TaskStatusReport::new(RemoteStatus::Error).with_message(Some("internal error".into())),
        )]));
        let sender = Arc::new(RecordingSender::default());
        let mgr = manager(provider, &dir).with_sender(sender.clone());

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;
        mgr.run_once().await;

        let task = mgr.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("internal error"));
        assert!(mgr.get_all_status().await.running.is_empty());

        let sent = sender.deliveries();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Delivery::Text(t) if t.contains("internal error")));
    }

    #[tokio::test]
    async fn test_remote_cancelled_completes_task() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            MockProvider::default().script(vec![Ok(TaskStatusReport::new(RemoteStatus::Cancelled))]),
        );
        let sender = Arc::new(RecordingSender::default());
        let mgr = manager(provider.clone(), &dir).with_sender(sender.clone());

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;
        mgr.run_once().await;

        let task = mgr.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.completed_at.is_some());
        assert_eq!(provider.cancel_calls.load(Ordering::SeqCst), 0);

        // Further ticks must not re-notify.
        mgr.run_once().await;
        let sent = sender.deliveries();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Delivery::Text(t) if t.contains("cancelled")));
    }

    #[tokio::test]
    async fn test_scenario_timeout_then_next_task() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default());
        let sender = Arc::new(RecordingSender::default());
        let mgr = manager(provider.clone(), &dir).with_sender(sender.clone());

        let first = mgr.enqueue(request("a")).await.unwrap();
        let second = mgr.enqueue(request("b")).await.unwrap();
        mgr.run_once().await;
        rewind_start(&mgr, 700).await;
        mgr.run_once().await;

        let task = mgr.get_task(&first).await.unwrap();
        assert_eq!(task.status, TaskStatus::Timeout);
        assert_eq!(provider.status_calls.load(Ordering::SeqCst), 0);
        assert!(matches!(&sender.deliveries()[0], Delivery::Text(t) if t.contains("timed out")));

        mgr.run_once().await;
        assert_eq!(mgr.get_task(&second).await.unwrap().status, TaskStatus::Running);
    }

    // ── Cancellation ──

    #[tokio::test]
    async fn test_cancel_queued_never_calls_provider() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default());
        let sender = Arc::new(RecordingSender::default());
        let mgr = manager(provider.clone(), &dir).with_sender(sender.clone());

        let id = mgr.enqueue(request("a")).await.unwrap();
        let outcome = mgr.cancel_task(&id).await;
        assert!(outcome.ok);
        assert_eq!(mgr.get_queue_position(&id).await, 0);
        assert_eq!(mgr.get_task(&id).await.unwrap().status, TaskStatus::Cancelled);
        assert_eq!(provider.cancel_calls.load(Ordering::SeqCst), 0);
        assert!(provider.creates.lock().unwrap().is_empty());
        assert_eq!(sender.deliveries().len(), 1);

        assert!(!mgr.cancel_task(&id).await.ok);
        assert!(!mgr.cancel_task("missing").await.ok);
    }

    #[tokio::test]
    async fn test_cancel_running_without_remote_id_refused() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default());
        let mgr = manager(provider.clone(), &dir);

        let id = mgr.enqueue(request("a")).await.unwrap();
        {
            let mut state = mgr.state.lock().await;
            let mut task = state.queue.pop_front().unwrap();
            task.status = TaskStatus::Running;
            state.running = Some(task);
        }

        let outcome = mgr.cancel_task(&id).await;
        assert!(!outcome.ok);
        assert_eq!(mgr.get_task(&id).await.unwrap().status, TaskStatus::Running);
        assert_eq!(provider.cancel_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_running_delegates_to_provider() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default());
        let mgr = manager(provider.clone(), &dir);

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;
        assert!(mgr.cancel_task(&id).await.ok);

        assert_eq!(provider.cancel_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.get_task(&id).await.unwrap().status, TaskStatus::Cancelled);
        assert!(mgr.get_all_status().await.running.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_refused_keeps_task_running() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider {
            refuse_cancel: true,
            ..Default::default()
        });
        let mgr = manager(provider, &dir);

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;
        let outcome = mgr.cancel_task(&id).await;
        assert!(!outcome.ok);
        assert!(outcome.message.contains("cannot be cancelled"));
        assert_eq!(mgr.get_task(&id).await.unwrap().status, TaskStatus::Running);
    }

    // ── Completion & notification ──

    #[tokio::test]
    async fn test_success_downloads_and_sends_file() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 2048]))
            .mount(&server)
            .await;
        let url = format!("{}/out.mp4", server.uri());

        let provider = Arc::new(MockProvider::default().script(vec![Ok(
            TaskStatusReport::new(RemoteStatus::Succeeded).with_video_url(Some(url.clone())),
        )]));
        let sender = Arc::new(RecordingSender::default());
        let mgr = manager(provider, &dir).with_sender(sender.clone());

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;
        mgr.run_once().await;

        let task = mgr.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Succeeded);
        assert_eq!(task.progress, 100);
        assert_eq!(task.video_url.as_deref(), Some(url.as_str()));
        let local = task.local_path.unwrap();
        assert_eq!(std::fs::metadata(&local).unwrap().len(), 2048);

        let sent = sender.deliveries();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], Delivery::Text(t) if t.contains("Seedance")));
        assert_eq!(sent[1], Delivery::File(local));
    }

    #[tokio::test]
    async fn test_success_download_failure_falls_back_to_url() {
        let dir = TempDir::new().unwrap();
        let url = "http://127.0.0.1:1/out.mp4".to_string();
        let provider = Arc::new(MockProvider::default().script(vec![Ok(
            TaskStatusReport::new(RemoteStatus::Succeeded).with_video_url(Some(url.clone())),
        )]));
        let sender = Arc::new(RecordingSender {
            fail_urls: true,
            ..Default::default()
        });
        let mgr = manager(provider, &dir).with_sender(sender.clone());

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;
        mgr.run_once().await;

        assert!(mgr.get_task(&id).await.unwrap().local_path.is_none());
        let sent = sender.deliveries();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1], Delivery::VideoUrl(url.clone()));
        assert_eq!(sent[2], Delivery::Text(manual_download_text(&url)));
    }

    #[tokio::test]
    async fn test_success_without_url_warns() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            MockProvider::default().script(vec![Ok(TaskStatusReport::new(RemoteStatus::Succeeded))]),
        );
        let sender = Arc::new(RecordingSender::default());
        let mgr = manager(provider, &dir).with_sender(sender.clone());

        mgr.enqueue(request("a")).await.unwrap();
        mgr.run_once().await;
        mgr.run_once().await;

        let sent = sender.deliveries();
        assert_eq!(sent.last(), Some(&Delivery::Text(MISSING_URL_TEXT.to_string())));
    }

    #[tokio::test]
    async fn test_no_chat_id_no_notification() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider {
            fail_create: true,
            ..Default::default()
        });
        let sender = Arc::new(RecordingSender::default());
        let mgr = manager(provider, &dir).with_sender(sender.clone());

        let mut req = request("a");
        req.chat_id = None;
        mgr.enqueue(req).await.unwrap();
        mgr.run_once().await;
        assert!(sender.deliveries().is_empty());
    }

    // ── Lifecycle ──

    #[tokio::test]
    async fn test_cleanup_completed() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(Arc::new(MockProvider::default()), &dir);

        let id = mgr.enqueue(request("a")).await.unwrap();
        mgr.cancel_task(&id).await;
        assert_eq!(mgr.cleanup_completed(Duration::from_secs(3600)).await, 0);

        mgr.state.lock().await.completed.get_mut(&id).unwrap().completed_at =
            Some(Utc::now() - chrono::Duration::hours(2));
        assert_eq!(mgr.cleanup_completed(Duration::from_secs(3600)).await, 1);
        assert!(mgr.get_task(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_idle_run_once_returns_base_interval() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(Arc::new(MockProvider::default()), &dir);
        assert_eq!(mgr.run_once().await, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_start_stop() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::default());
        let mgr = Arc::new(manager(provider.clone(), &dir));

        let id = mgr.submit_task(request("a")).await.unwrap();
        assert!(mgr.is_running().await);
        mgr.start().await;

        tokio::time::timeout(Duration::from_secs(5), async {
            while mgr.get_task(&id).await.unwrap().remote_id.is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        mgr.stop().await;
        assert!(!mgr.is_running().await);
        assert_eq!(provider.creates.lock().unwrap().len(), 1);
        mgr.stop().await;
    }
}
