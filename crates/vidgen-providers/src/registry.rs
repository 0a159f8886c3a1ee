//! Adapter registry: static table mapping a config `format` to the
//! adapter that speaks that vendor's wire protocol.

use std::sync::Arc;

use tracing::debug;

use vidgen_core::config::{HttpConfig, ModelConfig};

use crate::aliyun::AliyunProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::VideoProvider;
use crate::volcengine::VolcengineProvider;
use crate::zhipu::ZhipuProvider;

// ─────────────────────────────────────────────
// AdapterConfig: what an adapter needs to connect
// ─────────────────────────────────────────────

/// Connection settings for one adapter instance.
#[derive(Clone, Default)]
pub struct AdapterConfig {
    pub api_key: String,
    /// Overrides the adapter's built-in base URL when set.
    pub base_url: Option<String>,
    pub http: HttpConfig,
}

impl std::fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("api_key", &if self.api_key.is_empty() { "(empty)" } else { "***" })
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AdapterConfig {
    /// Build from a model entry. Blank base URLs count as unset.
    pub fn from_model(model: &ModelConfig, http: &HttpConfig) -> Self {
        Self {
            api_key: model.api_key.trim().to_string(),
            base_url: model
                .base_url
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            http: http.clone(),
        }
    }
}

// ─────────────────────────────────────────────
// AdapterSpec
// ─────────────────────────────────────────────

/// Static description of one adapter.
#[derive(Clone, Copy, Debug)]
pub struct AdapterSpec {
    /// Config `format` value (e.g. `"volcengine"`).
    pub format: &'static str,
    pub display_name: &'static str,
    pub default_base_url: &'static str,
    build: fn(&AdapterConfig) -> Arc<dyn VideoProvider>,
}

impl AdapterSpec {
    pub fn build(&self, config: &AdapterConfig) -> Arc<dyn VideoProvider> {
        debug!(
            format = self.format,
            base_url = config.base_url.as_deref().unwrap_or(self.default_base_url),
            "building video adapter"
        );
        (self.build)(config)
    }
}

/// All adapters, in listing order.
pub static ADAPTERS: &[AdapterSpec] = &[
    AdapterSpec {
        format: "volcengine",
        display_name: "Volcengine Ark",
        default_base_url: crate::volcengine::DEFAULT_BASE_URL,
        build: |c| Arc::new(VolcengineProvider::new(c)),
    },
    AdapterSpec {
        format: "aliyun",
        display_name: "Aliyun DashScope",
        default_base_url: crate::aliyun::DEFAULT_BASE_URL,
        build: |c| Arc::new(AliyunProvider::new(c)),
    },
    AdapterSpec {
        format: "zhipu",
        display_name: "Zhipu CogVideoX",
        default_base_url: crate::zhipu::DEFAULT_BASE_URL,
        build: |c| Arc::new(ZhipuProvider::new(c)),
    },
    AdapterSpec {
        format: "openai",
        display_name: "OpenAI-compatible",
        default_base_url: crate::openai_compat::DEFAULT_BASE_URL,
        build: |c| Arc::new(OpenAiCompatProvider::new(c)),
    },
];

/// Find an adapter by config format (case-insensitive).
pub fn find_adapter(format: &str) -> Option<&'static AdapterSpec> {
    let format = format.trim();
    ADAPTERS.iter().find(|a| a.format.eq_ignore_ascii_case(format))
}

/// Every format name an adapter exists for.
pub fn supported_formats() -> Vec<&'static str> {
    ADAPTERS.iter().map(|a| a.format).collect()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
