//! Outbound notifications: the chat-side seam and the message texts.

use std::path::PathBuf;

use async_trait::async_trait;

use vidgen_core::utils::truncate_string;

use crate::types::Task;

/// What gets sent to a chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Text(String),
    /// A downloaded video on local disk.
    File(PathBuf),
    /// A remote video link, for hosts that can embed it.
    VideoUrl(String),
}

/// Anything that can deliver messages to a chat (bot host, console, ...).
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, chat_id: &str, delivery: Delivery) -> anyhow::Result<()>;
}

// ─────────────────────────────────────────────
// Message texts
// ─────────────────────────────────────────────

pub fn success_text(task: &Task, model_name: &str) -> String {
    format!(
        "🎉 {} finished!\n📋 Task: {}\n🎬 Model: {}\n📝 Prompt: {}\n⏳ Downloading...",
        task.kind.label(),
        task.id,
        model_name,
        truncate_string(&task.prompt, 30)
    )
}

pub fn failure_text(task: &Task, model_name: &str) -> String {
    format!(
        "❌ {} failed\n📋 Task: {}\n🎬 Model: {}\n💬 Reason: {}",
        task.kind.label(),
        task.id,
        model_name,
        task.error.as_deref().unwrap_or("unknown error")
    )
}

pub fn timeout_text(task: &Task) -> String {
    format!(
        "⏰ {} timed out\n📋 Task: {}\n💡 Please try again later",
        task.kind.label(),
        task.id
    )
}

pub fn cancelled_text(task: &Task) -> String {
    format!("🚫 Task cancelled\n📋 Task: {}", task.id)
}

pub fn manual_download_text(url: &str) -> String {
    format!("⚠️ Could not send the video, download it manually:\n{url}")
}

pub const MISSING_URL_TEXT: &str = "⚠️ The provider returned no video URL";
