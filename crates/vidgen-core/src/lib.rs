//! Shared building blocks for vidgen: configuration, templates, media
//! helpers, and path utilities.

pub mod config;
pub mod music;
pub mod resolution;
pub mod templates;
pub mod utils;

pub use config::Config;
pub use templates::TemplateStore;
