//! Config loader: reads `~/.vidgen/config.json`, expands `${ENV}`
//! placeholders, and merges env var overrides.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.vidgen/config.json`
//! 3. Environment variables `VIDGEN_<SECTION>__<FIELD>` (override JSON)
//! 4. `${NAME}` placeholders in model `apiKey` / `baseUrl`

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    let config = load_config_from_path(&config_path);
    resolve_model_env(apply_env_overrides(config))
}

/// Load config from a specific file path, without env processing.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str::<Config>(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

// ─────────────────────────────────────────────
// ${ENV} expansion
// ─────────────────────────────────────────────

fn env_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").ok())
        .as_ref()
}

/// Replace every `${NAME}` in `value` with the env var `NAME`.
///
/// Unset variables expand to an empty string.
pub fn expand_env_vars(value: &str) -> String {
    let Some(pattern) = env_pattern().filter(|_| value.contains("${")) else {
        return value.to_string();
    };

    pattern
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match std::env::var(name) {
                Ok(v) if !v.is_empty() => {
                    debug!(var = name, "resolved env placeholder");
                    v
                }
                _ => {
                    warn!(var = name, "env placeholder not set");
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Expand placeholders in each model's credential and base URL.
fn resolve_model_env(mut config: Config) -> Config {
    for (id, model) in config.models.iter_mut() {
        if model.api_key.contains("${") {
            model.api_key = expand_env_vars(&model.api_key);
            if model.is_configured() {
                info!(model = %id, "API key loaded from environment");
            }
        }
        if let Some(base) = model.base_url.as_mut() {
            if base.contains("${") {
                *base = expand_env_vars(base);
            }
        }
    }
    config
}

// ─────────────────────────────────────────────
// Env var overrides
// ─────────────────────────────────────────────

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `VIDGEN_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `VIDGEN_GENERATION__DEFAULT_MODEL` → `generation.default_model`
/// - `VIDGEN_QUEUE__MAX_QUEUE_SIZE` → `queue.max_queue_size`
/// - `VIDGEN_QUEUE__TASK_TIMEOUT` → `queue.task_timeout`
/// - `VIDGEN_QUEUE__POLL_INTERVAL` → `queue.poll_interval`
/// - `VIDGEN_DOWNLOAD__DIR` → `download.dir`
/// - `VIDGEN_DOWNLOAD__MAX_FILES` → `download.max_files`
/// - `VIDGEN_MODELS__<ID>__API_KEY` → `models.<id>.api_key`
/// - `VIDGEN_MODELS__<ID>__BASE_URL` → `models.<id>.base_url`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("VIDGEN_GENERATION__DEFAULT_MODEL") {
        config.generation.default_model = val;
    }
    if let Some(n) = env_parse::<usize>("VIDGEN_QUEUE__MAX_QUEUE_SIZE") {
        config.queue.max_queue_size = n;
    }
    if let Some(n) = env_parse::<u64>("VIDGEN_QUEUE__TASK_TIMEOUT") {
        config.queue.task_timeout = n;
    }
    if let Some(n) = env_parse::<u64>("VIDGEN_QUEUE__POLL_INTERVAL") {
        config.queue.poll_interval = n;
    }
    if let Ok(val) = std::env::var("VIDGEN_DOWNLOAD__DIR") {
        config.download.dir = val;
    }
    if let Some(n) = env_parse::<usize>("VIDGEN_DOWNLOAD__MAX_FILES") {
        config.download.max_files = n;
    }

    for (id, model) in config.models.iter_mut() {
        let key = id.to_uppercase();
        if let Ok(val) = std::env::var(format!("VIDGEN_MODELS__{key}__API_KEY")) {
            model.api_key = val;
        }
        if let Ok(val) = std::env::var(format!("VIDGEN_MODELS__{key}__BASE_URL")) {
            model.base_url = Some(val);
        }
    }

    config
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let val = std::env::var(name).ok()?;
    match val.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %val, "ignoring unparsable env override");
            None
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
