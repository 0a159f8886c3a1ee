//! `vidgen models`, `vidgen capabilities`, `vidgen templates`: read-only
//! listings.

use anyhow::{bail, Result};
use colored::Colorize;

use vidgen_core::config::load_config;
use vidgen_core::TemplateStore;
use vidgen_providers::capabilities::{ProviderCapabilities, PROVIDER_CAPABILITIES};
use vidgen_providers::{get_provider_capabilities, ModelCapabilities, VideoGenerator};

use crate::helpers::{key_mark, print_header};

pub fn models() -> Result<()> {
    let config = load_config(None);
    let generator = VideoGenerator::from_config(&config);

    print_header("Models");
    for m in generator.model_list() {
        let marker = if m.current { "→".green().to_string() } else { " ".to_string() };
        println!(
            "  {} {:<10} {:<28} {:<11} {}",
            marker,
            m.id,
            m.name,
            m.format.dimmed(),
            key_mark(m.configured)
        );
        println!(
            "    {:<10} {}{}",
            "",
            m.model.dimmed(),
            if m.support_img2video { "" } else { "  (text only)" }
        );
    }
    if generator.available_models().is_empty() {
        println!();
        println!("  {}", "No model has an API key yet.".yellow());
    }
    println!();
    Ok(())
}

pub fn capabilities(provider: Option<&str>) -> Result<()> {
    let selected: Vec<&ProviderCapabilities> = match provider {
        Some(name) => match get_provider_capabilities(name) {
            Some(caps) => vec![caps],
            None => bail!("unknown provider '{name}'"),
        },
        None => PROVIDER_CAPABILITIES.iter().collect(),
    };

    print_header("Capabilities");
    for caps in selected {
        println!(
            "  {} {}",
            caps.display_name.bold(),
            format!(
                "({}, cancel: {}, {} rpm)",
                caps.name,
                if caps.supports_cancel { "yes" } else { "no" },
                caps.rate_limit_rpm
            )
            .dimmed()
        );
        if caps.models.is_empty() {
            println!("    {}", "no declared models, requests pass through".dimmed());
        }
        for model in caps.models {
            print_model(model);
        }
        println!();
    }
    Ok(())
}

fn print_model(model: &ModelCapabilities) {
    println!("    {} {}", model.model_id, model.display_name.dimmed());
    println!("      resolutions: {}", model.resolution.presets.join(", "));
    let durations = if model.duration.allowed_values.is_empty() {
        format!("{}-{}s", model.duration.min_seconds, model.duration.max_seconds)
    } else {
        let values: Vec<String> = model
            .duration
            .allowed_values
            .iter()
            .map(|d| format!("{d}s"))
            .collect();
        values.join(", ")
    };
    println!("      durations:   {durations}");
    let fps: Vec<String> = model.fps.allowed_values.iter().map(u32::to_string).collect();
    println!("      fps:         {}", fps.join(", "));
    let features: Vec<String> = model.video_features.iter().map(|f| format!("{f:?}")).collect();
    println!("      features:    {}", features.join(", "));
    if model.has_audio() {
        let audio: Vec<String> = model.audio_features.iter().map(|f| format!("{f:?}")).collect();
        println!("      audio:       {}", audio.join(", "));
    }
}

pub fn templates() -> Result<()> {
    let config = load_config(None);
    print_header("Templates");

    if !config.templates.enabled {
        println!("  {}", "Templates are disabled in config.".yellow());
        println!();
        return Ok(());
    }
    let store = TemplateStore::new(&config.templates.list);
    if store.is_empty() {
        println!("  {}", "No templates configured.".dimmed());
    }
    for t in store.iter() {
        println!(
            "  {:<14} {} {}",
            t.keyword.bold(),
            t.description,
            format!("({} | {} fps | {}s)", t.resolution, t.fps, t.duration).dimmed()
        );
    }
    println!();
    Ok(())
}
