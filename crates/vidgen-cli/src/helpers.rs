//! Shared CLI helpers: status marks, headers, progress bars.

use colored::Colorize;

use vidgen_tasks::{TaskStatus, TaskSummary};

/// Green check or dimmed "not configured" marker.
pub fn key_mark(configured: bool) -> String {
    if configured {
        format!("{} (key set)", "✓".green())
    } else {
        format!("{}", "· not configured".dimmed())
    }
}

/// Print a section header.
pub fn print_header(title: &str) {
    println!();
    println!("{}", format!("🎬 {title}").cyan().bold());
    println!();
}

/// Text progress bar, `width` cells wide.
pub fn progress_bar(progress: u8, width: usize) -> String {
    let filled = (usize::from(progress.min(100)) * width) / 100;
    format!("[{}{}] {:>3}%", "#".repeat(filled), "-".repeat(width - filled), progress)
}

/// One status line for a task.
pub fn task_line(task: &TaskSummary) -> String {
    let status = match task.status {
        TaskStatus::Succeeded => task.status.as_str().green(),
        TaskStatus::Failed | TaskStatus::Timeout => task.status.as_str().red(),
        TaskStatus::Cancelled => task.status.as_str().yellow(),
        TaskStatus::Queued | TaskStatus::Running => task.status.as_str().normal(),
    };
    format!(
        "{} {:<10} {} polls={}",
        task.id.dimmed(),
        status,
        progress_bar(task.progress, 20),
        task.poll_count
    )
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
