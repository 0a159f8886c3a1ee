//! `vidgen task`: talk to a provider about an existing remote task.
//!
//! - `vidgen task status --model ID REMOTE_ID`: one status query
//! - `vidgen task cancel --model ID REMOTE_ID`: ask the provider to cancel

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;

use vidgen_core::config::load_config;
use vidgen_providers::{RemoteStatus, TaskStatusReport, VideoGenerator};

use crate::helpers::progress_bar;

/// Task subcommands.
#[derive(Subcommand)]
pub enum TaskCommands {
    /// Query a remote task
    Status {
        /// Model ID from config (defaults to the current model)
        #[arg(short, long)]
        model: Option<String>,

        /// Provider-assigned task ID
        remote_id: String,
    },

    /// Cancel a remote task
    Cancel {
        /// Model ID from config (defaults to the current model)
        #[arg(short, long)]
        model: Option<String>,

        /// Provider-assigned task ID
        remote_id: String,
    },
}

/// Dispatch a task subcommand.
pub async fn dispatch(cmd: TaskCommands) -> Result<()> {
    let config = load_config(None);
    let generator = VideoGenerator::from_config(&config);

    match cmd {
        TaskCommands::Status { model, remote_id } => {
            let model = model.unwrap_or_else(|| generator.current_model());
            let report = generator.task_status(&remote_id, &model).await?;
            println!("{}", format_report(&remote_id, &report));
            Ok(())
        }
        TaskCommands::Cancel { model, remote_id } => {
            let model = model.unwrap_or_else(|| generator.current_model());
            let outcome = generator.cancel(&remote_id, &model).await;
            if !outcome.ok {
                bail!("cancel refused: {}", outcome.message);
            }
            println!("{} {}", "✓".green(), outcome.message);
            Ok(())
        }
    }
}

fn format_report(remote_id: &str, report: &TaskStatusReport) -> String {
    let status = match report.status {
        RemoteStatus::Succeeded => report.status.as_str().green(),
        RemoteStatus::Failed | RemoteStatus::Error => report.status.as_str().red(),
        _ => report.status.as_str().normal(),
    };
    let mut out = format!("{remote_id}  {status}  {}", progress_bar(report.progress, 20));
    if let Some(url) = &report.video_url {
        out.push_str(&format!("\n  video: {url}"));
    }
    if let Some(message) = &report.message {
        out.push_str(&format!("\n  message: {message}"));
    }
    out
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
