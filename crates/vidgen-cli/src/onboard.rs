//! `vidgen init`: initialize configuration and the videos directory.
//!
//! - Creates `~/.vidgen/config.json` with defaults
//! - Creates the download directory from `download.dir`

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use vidgen_core::config::{get_config_path, load_config, save_config};
use vidgen_core::utils::expand_home;

/// Run the init command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "🎬 vidgen — Setup".cyan().bold());
    println!();

    let config_path = get_config_path();
    write_default_config(&config_path)?;

    let config = load_config(Some(&config_path));
    let videos = expand_home(&config.download.dir);
    ensure_dir(&videos, "videos dir")?;

    println!();
    println!(
        "{}",
        "  Setup complete! Add API keys (or export ARK_API_KEY, DASHSCOPE_API_KEY, ...) and run `vidgen status`."
            .green()
    );
    println!();

    Ok(())
}

/// Write the default config unless one exists. Returns whether it wrote.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        println!("  {} config already exists at {}", "✓".green(), path.display());
        return Ok(false);
    }
    // Defaults keep `${VAR}` placeholders; nothing is expanded yet.
    let config = vidgen_core::Config::default();
    save_config(&config, Some(path))?;
    println!("  {} created config at {}", "✓".green(), path.display());
    Ok(true)
}

fn ensure_dir(path: &Path, label: &str) -> Result<()> {
    std::fs::create_dir_all(path)?;
    println!("  {} {} at {}", "✓".green(), label, path.display());
    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
