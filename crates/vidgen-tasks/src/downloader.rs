//! Resumable video downloader.
//!
//! Data streams into `<name>.tmp`. When a temp file already exists the
//! request asks for `Range: bytes=<len>-`; a 206 appends and a 200 starts
//! over. Transfer errors keep the temp file so the next call can resume.
//! Completed files are renamed into place.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use reqwest::header::RANGE;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use vidgen_core::config::DownloadConfig;
use vidgen_core::utils::{expand_home, safe_filename};

const TEMP_SUFFIX: &str = "tmp";
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "webm"];

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("video URL is empty")]
    EmptyUrl,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("download timed out after {0:?}")]
    Timeout(Duration),
    #[error("downloaded file is empty")]
    EmptyFile,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Turns byte counts into 10% log milestones.
#[derive(Debug)]
struct ProgressMilestones {
    total: Option<u64>,
    next: u64,
}

impl ProgressMilestones {
    fn new(total: Option<u64>, already: u64) -> Self {
        let mut m = Self {
            total: total.filter(|t| *t > 0),
            next: 10,
        };
        if let Some(pct) = m.percent(already) {
            m.next = (pct / 10 + 1) * 10;
        }
        m
    }

    fn percent(&self, written: u64) -> Option<u64> {
        self.total.map(|t| (written.saturating_mul(100) / t).min(100))
    }

    /// The percentage reached, once per crossed milestone.
    fn update(&mut self, written: u64) -> Option<u64> {
        let pct = self.percent(written)?;
        if pct < self.next {
            return None;
        }
        self.next = (pct / 10 + 1) * 10;
        Some(pct)
    }
}

pub struct VideoDownloader {
    client: reqwest::Client,
    dir: PathBuf,
    max_files: usize,
    timeout: Duration,
    resume: bool,
    stale_temp: Duration,
}

impl VideoDownloader {
    pub fn new(config: &DownloadConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build download client, using defaults");
                reqwest::Client::new()
            });
        let dir = expand_home(&config.dir);
        info!(dir = %dir.display(), max_files = config.max_files, "video downloader ready");

        Self {
            client,
            dir,
            max_files: config.max_files,
            timeout,
            resume: config.resume,
            stale_temp: Duration::from_secs(config.stale_temp_secs),
        }
    }

    /// Stable name derived from the URL, so a retry finds the same temp file.
    pub fn default_filename(url: &str) -> String {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        format!("video_{:016x}.mp4", hasher.finish())
    }

    fn temp_path(final_path: &Path) -> PathBuf {
        let mut name = final_path.as_os_str().to_owned();
        name.push(".");
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    fn map_reqwest(&self, e: reqwest::Error) -> DownloadError {
        if e.is_timeout() {
            DownloadError::Timeout(self.timeout)
        } else {
            DownloadError::Network(e.to_string())
        }
    }

    // ── Housekeeping ──

    /// Finished videos in the download dir, oldest first.
    pub fn video_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut files: Vec<(SystemTime, PathBuf)> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .and_then(|x| x.to_str())
                    .map(|x| VIDEO_EXTENSIONS.contains(&x.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .filter_map(|p| {
                let modified = std::fs::metadata(&p).and_then(|m| m.modified()).ok()?;
                Some((modified, p))
            })
            .collect();
        files.sort_by_key(|(t, _)| *t);
        files.into_iter().map(|(_, p)| p).collect()
    }

    /// Delete the oldest videos until there is room for one more.
    pub fn cleanup_old_videos(&self) -> usize {
        let files = self.video_files();
        let mut removed = 0;
        let mut remaining = files.len();
        for path in files {
            if remaining < self.max_files.max(1) {
                break;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(file = %path.display(), "removed old video");
                    removed += 1;
                    remaining -= 1;
                }
                Err(e) => {
                    error!(file = %path.display(), error = %e, "failed to remove old video");
                    break;
                }
            }
        }
        removed
    }

    /// Delete orphaned temp files older than the stale threshold.
    pub fn cleanup_temp_files(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return 0;
        };
        let now = SystemTime::now();
        let mut removed = 0;
        for path in entries.flatten().map(|e| e.path()) {
            if path.extension().and_then(|x| x.to_str()) != Some(TEMP_SUFFIX) {
                continue;
            }
            let age = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|m| now.duration_since(m).ok());
            if matches!(age, Some(a) if a > self.stale_temp) && std::fs::remove_file(&path).is_ok() {
                debug!(file = %path.display(), "removed stale temp file");
                removed += 1;
            }
        }
        removed
    }

    // ── Download ──

    /// Fetch `url` into the download dir and return the final path.
    ///
    /// `filename` defaults to [`Self::default_filename`]. Resumes a partial
    /// file when the config allows it.
    pub async fn download(&self, url: &str, filename: Option<&str>) -> Result<PathBuf, DownloadError> {
        self.download_with(url, filename, true).await
    }

    /// Like [`Self::download`]; `resume = false` discards any partial file
    /// and starts from zero. Resuming also requires `download.resume`.
    pub async fn download_with(
        &self,
        url: &str,
        filename: Option<&str>,
        resume: bool,
    ) -> Result<PathBuf, DownloadError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DownloadError::EmptyUrl);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        self.cleanup_old_videos();
        self.cleanup_temp_files();

        let name = filename
            .map(safe_filename)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| Self::default_filename(url));
        let final_path = self.dir.join(name);
        let temp_path = Self::temp_path(&final_path);

        let mut offset = if resume && self.resume {
            tokio::fs::metadata(&temp_path).await.map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };
        if offset > 0 {
            info!(file = %final_path.display(), bytes = offset, "resuming partial download");
        } else {
            info!(file = %final_path.display(), "starting download");
        }

        let mut req = self.client.get(url);
        if offset > 0 {
            req = req.header(RANGE, format!("bytes={offset}-"));
        }
        let mut response = req.send().await.map_err(|e| self.map_reqwest(e))?;

        let append = match (offset > 0, response.status()) {
            (true, StatusCode::PARTIAL_CONTENT) => true,
            (true, StatusCode::OK) => {
                warn!("server ignored the range request, restarting from zero");
                offset = 0;
                false
            }
            (false, StatusCode::OK) => false,
            (_, status) => return Err(DownloadError::Status(status.as_u16())),
        };

        let mut file = if append {
            OpenOptions::new().append(true).open(&temp_path).await?
        } else {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp_path)
                .await?
        };

        let total = response.content_length().map(|len| len + offset);
        let mut milestones = ProgressMilestones::new(total, offset);
        let mut written = offset;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                    if let Some(pct) = milestones.update(written) {
                        info!(file = %final_path.display(), bytes = written, total = ?total, percent = pct, "download progress");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // Keep what we have for the next attempt.
                    let _ = file.flush().await;
                    let err = self.map_reqwest(e);
                    warn!(file = %temp_path.display(), bytes = written, error = %err, "download interrupted, partial file kept");
                    return Err(err);
                }
            }
        }
        file.flush().await?;
        drop(file);

        if tokio::fs::metadata(&final_path).await.is_ok() {
            tokio::fs::remove_file(&final_path).await?;
        }
        tokio::fs::rename(&temp_path, &final_path).await?;

        let size = tokio::fs::metadata(&final_path).await?.len();
        if size == 0 {
            let _ = tokio::fs::remove_file(&final_path).await;
            return Err(DownloadError::EmptyFile);
        }
        info!(file = %final_path.display(), mb = size as f64 / 1024.0 / 1024.0, "download complete");
        Ok(final_path)
    }
}
