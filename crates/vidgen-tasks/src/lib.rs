//! Task orchestration for vidgen.
//!
//! - [`manager::TaskManager`]: queue, single running slot, timeout, completion
//! - [`poller::SmartPoller`]: adaptive poll intervals
//! - [`downloader::VideoDownloader`]: resumable artifact download with retention
//! - [`notify::ChatSender`]: where terminal-state messages are delivered

pub mod downloader;
pub mod manager;
pub mod notify;
pub mod poller;
pub mod types;

pub use downloader::{DownloadError, VideoDownloader};
pub use manager::TaskManager;
pub use notify::{ChatSender, Delivery};
pub use poller::SmartPoller;
pub use types::{MusicOptions, StatusSnapshot, Task, TaskKind, TaskRequest, TaskStatus, TaskSummary};
