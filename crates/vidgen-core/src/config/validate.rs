//! Sanity checks over a loaded `Config`.
//!
//! Problems are reported, not enforced: the binary logs them and keeps going.

use tracing::{info, warn};

use super::schema::Config;

/// Frame rates accepted as a generation default.
pub const VALID_DEFAULT_FPS: &[u32] = &[15, 24, 30];

/// Check a config and return human-readable problems (empty = OK).
///
/// `known_formats` is the list of adapter formats the caller can build
/// (see `vidgen_providers::supported_formats`).
pub fn validate_config(config: &Config, known_formats: &[&str]) -> Vec<String> {
    let mut problems = Vec::new();
    validate_models(config, known_formats, &mut problems);
    validate_generation(config, &mut problems);
    validate_queue(config, &mut problems);
    validate_timing(config, &mut problems);
    problems
}

/// Validate and log the outcome. Returns `true` when no problems were found.
pub fn validate_and_log(config: &Config, known_formats: &[&str]) -> bool {
    let problems = validate_config(config, known_formats);
    if problems.is_empty() {
        info!("config validation passed");
        return true;
    }
    for p in &problems {
        warn!(problem = %p, "config problem");
    }
    false
}

fn validate_models(config: &Config, known_formats: &[&str], problems: &mut Vec<String>) {
    if config.models.is_empty() {
        problems.push("no models configured".to_string());
        return;
    }

    let mut configured = 0usize;
    for (id, model) in &config.models {
        if model.format.is_empty() {
            problems.push(format!("model {id}: missing format"));
        } else if !known_formats.contains(&model.format.as_str()) {
            problems.push(format!("model {id}: unsupported format '{}'", model.format));
        }
        if model.model.is_empty() {
            problems.push(format!("model {id}: missing vendor model name"));
        }
        if model.is_configured() {
            configured += 1;
        }
    }

    if configured == 0 {
        problems.push("no model has an API key".to_string());
    }

    info!(
        models = config.models.len(),
        configured = configured,
        "checked model entries"
    );
}

fn validate_generation(config: &Config, problems: &mut Vec<String>) {
    let gen = &config.generation;
    if !VALID_DEFAULT_FPS.contains(&gen.default_fps) {
        problems.push(format!("default fps {} is not one of 15/24/30", gen.default_fps));
    }
    if !(1..=60).contains(&gen.default_duration) {
        problems.push(format!(
            "default duration {} is outside 1..=60",
            gen.default_duration
        ));
    }
    if !gen.default_model.is_empty() && !config.models.contains_key(&gen.default_model) {
        problems.push(format!(
            "default model '{}' is not in the models map",
            gen.default_model
        ));
    }
}

fn validate_queue(config: &Config, problems: &mut Vec<String>) {
    let q = &config.queue;
    if !(1..=100).contains(&q.max_queue_size) {
        problems.push(format!("maxQueueSize {} is outside 1..=100", q.max_queue_size));
    }
    if !(60..=3600).contains(&q.task_timeout) {
        problems.push(format!("taskTimeout {} is outside 60..=3600", q.task_timeout));
    }
}

fn validate_timing(config: &Config, problems: &mut Vec<String>) {
    let p = &config.poller;
    if !(p.initial_interval > 0.0 && p.initial_interval <= 60.0) {
        problems.push(format!(
            "poller initialInterval {} is outside (0, 60]",
            p.initial_interval
        ));
    }
    if !(p.max_interval >= p.initial_interval && p.max_interval <= 3600.0) {
        problems.push(format!(
            "poller maxInterval {} must be between initialInterval and 3600",
            p.max_interval
        ));
    }
    if !(1.0..=10.0).contains(&p.multiplier) {
        problems.push(format!("poller multiplier {} is outside 1..=10", p.multiplier));
    }

    let h = &config.http;
    if !(1..=600).contains(&h.timeout) {
        problems.push(format!("http timeout {} is outside 1..=600", h.timeout));
    }
    if h.max_retries > 10 {
        problems.push(format!("http maxRetries {} is above 10", h.max_retries));
    }
    if !(0.0..=300.0).contains(&h.base_delay) {
        problems.push(format!("http baseDelay {} is outside 0..=300", h.base_delay));
    }
    if !(h.max_delay >= h.base_delay && h.max_delay <= 300.0) {
        problems.push(format!(
            "http maxDelay {} must be between baseDelay and 300",
            h.max_delay
        ));
    }
}
