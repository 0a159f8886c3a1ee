//! `vidgen status`: show configuration and model status.
//!
//! - Config path, generation defaults, queue settings
//! - Credential state for each model
//! - Problems found by config validation

use anyhow::Result;
use colored::Colorize;

use vidgen_core::config::{get_config_path, load_config, validate_config};
use vidgen_core::utils::expand_home;
use vidgen_providers::supported_formats;

use crate::helpers::{key_mark, print_header};

/// Run the status command.
pub fn run() -> Result<()> {
    let config_path = get_config_path();
    let config = load_config(Some(&config_path));

    print_header("vidgen Status");

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );

    let videos = expand_home(&config.download.dir);
    println!(
        "  {:<18} {} {}",
        "Videos:".bold(),
        videos.display(),
        if videos.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    let g = &config.generation;
    println!("  {:<18} {}", "Default model:".bold(), g.default_model);
    println!(
        "  {:<18} {}",
        "Defaults:".bold(),
        format!("{} | {} fps | {}s", g.default_resolution, g.default_fps, g.default_duration).dimmed()
    );
    let q = &config.queue;
    println!(
        "  {:<18} {}",
        "Queue:".bold(),
        format!(
            "max {} | timeout {}s | poll {}s",
            q.max_queue_size, q.task_timeout, q.poll_interval
        )
        .dimmed()
    );

    println!();
    println!("  {}", "Models:".bold());
    for (id, model) in &config.models {
        let marker = if *id == g.default_model { "*" } else { " " };
        println!(
            "   {}{:<10} {:<28} {:<11} {}",
            marker,
            id,
            model.display_name(),
            model.format.dimmed(),
            key_mark(model.is_configured())
        );
    }

    let problems = validate_config(&config, &supported_formats());
    println!();
    if problems.is_empty() {
        println!("  {} config looks good", "✓".green());
    } else {
        println!("  {}", "Config problems:".yellow().bold());
        for p in problems {
            println!("    {} {}", "!".yellow(), p);
        }
    }
    println!();

    Ok(())
}
