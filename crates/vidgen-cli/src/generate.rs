//! `vidgen generate`: submit one task through the task manager and follow
//! it to a terminal state, printing notifications to the console.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use clap::Args;
use colored::Colorize;
use tracing::info;

use vidgen_core::config::{load_config, validate_and_log, Config};
use vidgen_core::music::{describe_music_style, DEFAULT_MUSIC_VOLUME};
use vidgen_core::resolution::parse_resolution;
use vidgen_core::TemplateStore;
use vidgen_providers::{supported_formats, VideoGenerator};
use vidgen_tasks::{ChatSender, Delivery, MusicOptions, TaskManager, TaskRequest, TaskStatus, TaskSummary};

use crate::helpers::task_line;

const CONSOLE_CHAT: &str = "console";

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Prompt text (appended to the template prompt when both are given)
    pub prompt: Option<String>,

    /// Template keyword supplying prompt and defaults
    #[arg(short, long)]
    pub template: Option<String>,

    /// First-frame image URL or data URI
    #[arg(long)]
    pub first_frame: Option<String>,

    /// Last-frame image URL or data URI
    #[arg(long)]
    pub last_frame: Option<String>,

    /// Audio reference URL
    #[arg(long)]
    pub audio: Option<String>,

    /// Resolution preset (720p, 1080p, 480p, 4k) or WxH
    #[arg(short, long)]
    pub resolution: Option<String>,

    #[arg(long)]
    pub fps: Option<u32>,

    /// Duration in seconds
    #[arg(short, long)]
    pub duration: Option<u32>,

    /// Model ID from config (switches the current model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Ask the provider for a soundtrack
    #[arg(long, default_value_t = false)]
    pub music: bool,

    /// Music style (cinematic, upbeat, calm, ...)
    #[arg(long)]
    pub music_style: Option<String>,

    /// Music volume, 0.0 - 1.0
    #[arg(long)]
    pub music_volume: Option<f32>,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub logs: bool,
}

/// Prints deliveries instead of sending them to a chat.
struct ConsoleSender;

#[async_trait]
impl ChatSender for ConsoleSender {
    async fn send(&self, _chat_id: &str, delivery: Delivery) -> Result<()> {
        match delivery {
            Delivery::Text(text) => println!("\n{text}"),
            Delivery::File(path) => println!("📁 {}", path.display().to_string().green()),
            Delivery::VideoUrl(url) => println!("🔗 {url}"),
        }
        Ok(())
    }
}

/// Merge flags, template, and config defaults into a request.
fn build_request(args: &GenerateArgs, config: &Config, templates: &TemplateStore) -> Result<TaskRequest> {
    let template = match args.template.as_deref() {
        Some(keyword) => Some(
            templates
                .get(keyword)
                .ok_or_else(|| anyhow!("unknown template '{keyword}'"))?,
        ),
        None => None,
    };

    let user_prompt = args.prompt.as_deref().map(str::trim).unwrap_or_default();
    let prompt = match template {
        Some(t) if user_prompt.is_empty() => t.prompt.clone(),
        Some(t) => format!("{}, {}", t.prompt, user_prompt),
        None => user_prompt.to_string(),
    };
    if prompt.is_empty() {
        bail!("a prompt or --template is required");
    }

    let g = &config.generation;
    let resolution = args
        .resolution
        .clone()
        .or_else(|| template.map(|t| t.resolution.clone()))
        .unwrap_or_else(|| g.default_resolution.clone());
    parse_resolution(&resolution)?;

    Ok(TaskRequest {
        prompt,
        resolution,
        fps: args.fps.or(template.map(|t| t.fps)).unwrap_or(g.default_fps),
        duration: args
            .duration
            .or(template.map(|t| t.duration))
            .unwrap_or(g.default_duration),
        first_frame: args.first_frame.clone(),
        last_frame: args.last_frame.clone(),
        audio: args.audio.clone(),
        chat_id: Some(CONSOLE_CHAT.to_string()),
        user_id: whoami(),
        model_id: args.model.clone(),
        music: MusicOptions {
            enabled: args.music,
            style: args.music_style.clone(),
            volume: args.music_volume.unwrap_or(DEFAULT_MUSIC_VOLUME),
        },
    })
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "cli".to_string())
}

pub async fn run(args: GenerateArgs) -> Result<()> {
    let config = load_config(None);
    validate_and_log(&config, &supported_formats());

    let templates = if config.templates.enabled {
        TemplateStore::new(&config.templates.list)
    } else {
        TemplateStore::new(&[])
    };
    let request = build_request(&args, &config, &templates)?;

    let generator = Arc::new(VideoGenerator::from_config(&config));
    if let Some(model) = args.model.as_deref() {
        generator.switch_model(model)?;
    }
    let model_id = generator.current_model();

    let manager = Arc::new(
        TaskManager::from_config(&config, Arc::clone(&generator)).with_sender(Arc::new(ConsoleSender)),
    );

    println!();
    println!("{} {}", "🎬 Model:".bold(), model_id);
    println!("{} {}", "📝 Prompt:".bold(), request.prompt);
    println!(
        "{} {}",
        "⚙️  Params:".bold(),
        format!("{} | {} fps | {}s", request.resolution, request.fps, request.duration).dimmed()
    );
    if request.music.enabled {
        let style = request.music.style.as_deref().unwrap_or("auto");
        let desc = describe_music_style(style).unwrap_or("provider default");
        println!("{} {} ({})", "🎵 Music:".bold(), style, desc.dimmed());
    }

    let id = manager
        .submit_task(request)
        .await
        .ok_or_else(|| anyhow!("queue is full, try again later"))?;
    info!(task_id = %id, model_id = %model_id, "task submitted");
    println!("{} {}", "📋 Task:".bold(), id);
    println!("{}", "Press Ctrl-C to cancel.".dimmed());

    let status = follow(&manager, &id).await;
    manager.stop().await;

    match status {
        TaskStatus::Succeeded => Ok(()),
        other => bail!("task {id} finished as {other}"),
    }
}

/// Print progress until the task is terminal.
async fn follow(manager: &TaskManager, id: &str) -> TaskStatus {
    let mut last_line = String::new();
    let mut cancel_requested = false;
    loop {
        if let Some(task) = manager.get_task(id).await {
            let line = task_line(&TaskSummary::from(&task));
            if line != last_line {
                println!("{line}");
                last_line = line;
            }
            if task.status.is_terminal() {
                return task.status;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                let outcome = manager.cancel_task(id).await;
                if outcome.ok {
                    println!("{}", outcome.message.yellow());
                    cancel_requested = true;
                } else {
                    println!("{} {}", "cancel refused:".red(), outcome.message);
                }
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
