//! Video provider layer for vidgen.
//!
//! # Architecture
//!
//! - [`traits::VideoProvider`]: the create/status/cancel contract every vendor implements
//! - [`capabilities`]: static per-model capability declarations + parameter coercion
//! - [`http::HttpClient`]: shared JSON client with bounded retry/backoff
//! - [`volcengine`], [`aliyun`], [`zhipu`], [`openai_compat`]: the four adapters
//! - [`registry`]: `format` string to adapter constructor table
//! - [`generator::VideoGenerator`]: facade: model resolution, adapter cache, defaults

pub mod aliyun;
pub mod capabilities;
pub mod generator;
pub mod http;
pub mod openai_compat;
pub mod registry;
pub mod traits;
pub mod volcengine;
pub mod zhipu;

// Re-export main types for convenience
pub use capabilities::{get_model_capabilities, get_provider_capabilities, ModelCapabilities};
pub use generator::{GenerateRequest, GeneratorError, ModelSummary, Submission, VideoGenerator};
pub use http::{HttpClient, HttpError};
pub use registry::{find_adapter, supported_formats, AdapterConfig, ADAPTERS};
pub use traits::{
    CancelOutcome, CreateTaskRequest, ProviderError, RemoteStatus, TaskStatusReport,
    VideoProvider,
};
