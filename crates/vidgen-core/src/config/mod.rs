//! Configuration system: schema, loading, env var overrides, validation.
//!
//! # Usage
//! ```no_run
//! use vidgen_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Default model: {}", cfg.generation.default_model);
//! ```

pub mod loader;
pub mod schema;
pub mod validate;

// Re-export key types
pub use loader::{expand_env_vars, get_config_path, load_config, save_config};
pub use schema::{
    Config, DownloadConfig, GenerationConfig, HttpConfig, ModelConfig, PollerConfig, QueueConfig,
    TemplateConfig, TemplatesConfig,
};
pub use validate::{validate_and_log, validate_config};
