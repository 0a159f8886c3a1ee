//! Capability registry: static declarations of what each provider/model
//! supports.
//!
//! Pure data + lookup. Unknown providers or models return `None`; callers
//! degrade gracefully (no coercion, raw config echo) instead of failing.

use serde::Serialize;

// ─────────────────────────────────────────────
// Feature flags
// ─────────────────────────────────────────────

/// Video generation features a model may support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoFeature {
    TextToVideo,
    ImageToVideo,
    FirstFrame,
    LastFrame,
    VideoExtend,
    StyleTransfer,
    MotionBrush,
    CameraControl,
    MultiShot,
}

/// Audio features a model may support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioFeature {
    BackgroundMusic,
    AudioInput,
    LipSync,
    VoiceClone,
    AutoSound,
}

// ─────────────────────────────────────────────
// Parameter support
// ─────────────────────────────────────────────

/// Supported output resolutions.
#[derive(Clone, Debug, Serialize)]
pub struct ResolutionSupport {
    /// Preset names, first entry is the fallback.
    pub presets: &'static [&'static str],
    pub custom: bool,
    pub min_size: u32,
    pub max_size: u32,
    pub aspect_ratios: &'static [&'static str],
}

impl ResolutionSupport {
    pub const DEFAULT: Self = Self {
        presets: &["720p", "1080p"],
        custom: false,
        min_size: 480,
        max_size: 1920,
        aspect_ratios: &["16:9", "9:16", "1:1"],
    };

    pub const fn presets(presets: &'static [&'static str]) -> Self {
        Self {
            presets,
            ..Self::DEFAULT
        }
    }

    /// Case-insensitive preset check.
    pub fn supports(&self, resolution: &str) -> bool {
        self.presets
            .iter()
            .any(|p| p.eq_ignore_ascii_case(resolution.trim()))
    }

    /// First preset, or `720p` when none are declared.
    pub fn fallback(&self) -> &'static str {
        self.presets.first().copied().unwrap_or("720p")
    }
}

/// Supported clip lengths in seconds.
#[derive(Clone, Debug, Serialize)]
pub struct DurationSupport {
    pub min_seconds: u32,
    pub max_seconds: u32,
    pub step_seconds: u32,
    /// Fixed choices; empty means any value in `[min, max]`.
    pub allowed_values: &'static [u32],
}

impl DurationSupport {
    pub const DEFAULT: Self = Self {
        min_seconds: 1,
        max_seconds: 10,
        step_seconds: 1,
        allowed_values: &[],
    };

    pub const fn range(min_seconds: u32, max_seconds: u32) -> Self {
        Self {
            min_seconds,
            max_seconds,
            ..Self::DEFAULT
        }
    }

    pub const fn fixed(min_seconds: u32, max_seconds: u32, allowed_values: &'static [u32]) -> Self {
        Self {
            min_seconds,
            max_seconds,
            step_seconds: 1,
            allowed_values,
        }
    }

    /// Nearest allowed value when a fixed set exists, otherwise clamp.
    pub fn coerce(&self, duration: u32) -> u32 {
        nearest(self.allowed_values, duration)
            .unwrap_or_else(|| duration.clamp(self.min_seconds, self.max_seconds))
    }
}

/// Supported frame rates.
#[derive(Clone, Debug, Serialize)]
pub struct FpsSupport {
    pub allowed_values: &'static [u32],
    pub default: u32,
}

impl FpsSupport {
    pub const DEFAULT: Self = Self {
        allowed_values: &[24, 30],
        default: 24,
    };

    pub const fn only(allowed_values: &'static [u32], default: u32) -> Self {
        Self {
            allowed_values,
            default,
        }
    }

    /// Closest allowed frame rate.
    pub fn coerce(&self, fps: u32) -> u32 {
        nearest(self.allowed_values, fps).unwrap_or(fps)
    }
}

/// Closest value in `values` to `target`; ties go to the earlier entry.
fn nearest(values: &[u32], target: u32) -> Option<u32> {
    values.iter().copied().min_by_key(|v| v.abs_diff(target))
}

// ─────────────────────────────────────────────
// ModelCapabilities
// ─────────────────────────────────────────────

/// Declarative, immutable record of one model's abilities.
#[derive(Clone, Debug, Serialize)]
pub struct ModelCapabilities {
    pub model_id: &'static str,
    pub display_name: &'static str,
    pub video_features: &'static [VideoFeature],
    pub audio_features: &'static [AudioFeature],
    pub resolution: ResolutionSupport,
    pub duration: DurationSupport,
    pub fps: FpsSupport,
    pub max_prompt_length: usize,
    pub supports_negative_prompt: bool,
}

/// Outcome of [`ModelCapabilities::validate_params`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedParams {
    pub duration: u32,
    pub resolution: String,
    pub fps: u32,
    pub warnings: Vec<String>,
}

impl ModelCapabilities {
    pub fn supports(&self, feature: VideoFeature) -> bool {
        self.video_features.contains(&feature)
    }

    pub fn supports_audio(&self, feature: AudioFeature) -> bool {
        self.audio_features.contains(&feature)
    }

    pub fn has_img2video(&self) -> bool {
        self.supports(VideoFeature::ImageToVideo)
    }

    pub fn has_first_frame(&self) -> bool {
        self.supports(VideoFeature::FirstFrame)
    }

    pub fn has_last_frame(&self) -> bool {
        self.supports(VideoFeature::LastFrame)
    }

    pub fn has_audio(&self) -> bool {
        !self.audio_features.is_empty()
    }

    /// Coerce request parameters into what this model accepts.
    ///
    /// Never rejects: out-of-range values are replaced and a warning is
    /// recorded for each adjustment.
    pub fn validate_params(
        &self,
        duration: u32,
        resolution: &str,
        fps: u32,
        has_first_frame: bool,
        has_last_frame: bool,
    ) -> ValidatedParams {
        let mut warnings = Vec::new();

        let new_duration = self.duration.coerce(duration);
        if new_duration != duration {
            warnings.push(format!("duration adjusted: {duration}s -> {new_duration}s"));
        }

        let new_fps = self.fps.coerce(fps);
        if new_fps != fps {
            warnings.push(format!("fps adjusted: {fps} -> {new_fps}"));
        }

        let new_resolution = if self.resolution.supports(resolution) {
            resolution.to_string()
        } else {
            let fallback = self.resolution.fallback();
            warnings.push(format!("resolution adjusted: {resolution} -> {fallback}"));
            fallback.to_string()
        };

        if has_first_frame && !self.has_first_frame() {
            warnings.push(format!("{} does not declare first-frame control", self.model_id));
        }
        if has_last_frame && !self.has_last_frame() {
            warnings.push(format!("{} does not declare last-frame control", self.model_id));
        }

        ValidatedParams {
            duration: new_duration,
            resolution: new_resolution,
            fps: new_fps,
            warnings,
        }
    }

    const fn base(model_id: &'static str, display_name: &'static str) -> Self {
        Self {
            model_id,
            display_name,
            video_features: &[],
            audio_features: &[],
            resolution: ResolutionSupport::DEFAULT,
            duration: DurationSupport::DEFAULT,
            fps: FpsSupport::DEFAULT,
            max_prompt_length: 2000,
            supports_negative_prompt: false,
        }
    }
}

// ─────────────────────────────────────────────
// ProviderCapabilities
// ─────────────────────────────────────────────

/// Everything a provider declares about itself and its models.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderCapabilities {
    /// Matches the adapter format name (e.g. `"volcengine"`).
    pub name: &'static str,
    pub display_name: &'static str,
    pub models: &'static [ModelCapabilities],
    pub supports_async: bool,
    pub supports_cancel: bool,
    pub supports_webhook: bool,
    pub rate_limit_rpm: u32,
    pub concurrent_tasks: u32,
}

impl ProviderCapabilities {
    /// Look up a model by its vendor ID.
    pub fn get_model(&self, model_id: &str) -> Option<&'static ModelCapabilities> {
        self.models.iter().find(|m| m.model_id == model_id)
    }

    pub fn model_ids(&self) -> Vec<&'static str> {
        self.models.iter().map(|m| m.model_id).collect()
    }
}

// ─────────────────────────────────────────────
// Declarations
// ─────────────────────────────────────────────

use AudioFeature as A;
use VideoFeature as V;

/// All declared providers.
pub static PROVIDER_CAPABILITIES: &[ProviderCapabilities] = &[
    ProviderCapabilities {
        name: "volcengine",
        display_name: "Volcengine Ark",
        supports_async: true,
        supports_cancel: true,
        supports_webhook: false,
        rate_limit_rpm: 60,
        concurrent_tasks: 5,
        models: &[
            ModelCapabilities {
                video_features: &[V::TextToVideo, V::ImageToVideo, V::FirstFrame, V::LastFrame],
                audio_features: &[A::BackgroundMusic, A::AutoSound],
                resolution: ResolutionSupport::presets(&["720p", "1080p"]),
                duration: DurationSupport::fixed(5, 10, &[5, 10]),
                fps: FpsSupport::only(&[24], 24),
                ..ModelCapabilities::base("doubao-seedance-1-5-pro-251215", "Doubao Seedance 1.5 Pro")
            },
            ModelCapabilities {
                video_features: &[V::TextToVideo, V::ImageToVideo, V::FirstFrame, V::LastFrame],
                resolution: ResolutionSupport::presets(&["720p", "1080p"]),
                duration: DurationSupport::fixed(5, 5, &[5]),
                fps: FpsSupport::only(&[24], 24),
                ..ModelCapabilities::base("doubao-seedance-1-0-pro-250528", "Doubao Seedance 1.0 Pro")
            },
        ],
    },
    ProviderCapabilities {
        name: "aliyun",
        display_name: "Aliyun Wanxiang",
        supports_async: true,
        supports_cancel: false,
        supports_webhook: false,
        rate_limit_rpm: 60,
        concurrent_tasks: 5,
        models: &[
            ModelCapabilities {
                video_features: &[V::ImageToVideo, V::FirstFrame, V::MultiShot],
                audio_features: &[A::BackgroundMusic, A::AudioInput, A::AutoSound],
                resolution: ResolutionSupport::presets(&["720p", "1080p"]),
                duration: DurationSupport::range(2, 15),
                fps: FpsSupport::only(&[30], 30),
                supports_negative_prompt: true,
                ..ModelCapabilities::base("wan2.6-i2v-flash", "Wan 2.6 Flash")
            },
            ModelCapabilities {
                video_features: &[V::ImageToVideo, V::FirstFrame],
                audio_features: &[A::BackgroundMusic, A::AudioInput],
                resolution: ResolutionSupport::presets(&["480p", "720p", "1080p"]),
                duration: DurationSupport::fixed(5, 10, &[5, 10]),
                fps: FpsSupport::only(&[30], 30),
                supports_negative_prompt: true,
                ..ModelCapabilities::base("wan2.5-i2v-plus", "Wan 2.5 Plus (image-to-video)")
            },
            ModelCapabilities {
                video_features: &[V::TextToVideo],
                resolution: ResolutionSupport::presets(&["480p", "720p", "1080p"]),
                duration: DurationSupport::fixed(5, 5, &[5]),
                fps: FpsSupport::only(&[30], 30),
                supports_negative_prompt: true,
                ..ModelCapabilities::base("wan2.5-t2v-turbo", "Wan 2.5 Turbo (text-to-video)")
            },
        ],
    },
    ProviderCapabilities {
        name: "zhipu",
        display_name: "Zhipu CogVideoX",
        supports_async: true,
        supports_cancel: false,
        supports_webhook: false,
        rate_limit_rpm: 60,
        concurrent_tasks: 5,
        models: &[
            ModelCapabilities {
                video_features: &[V::TextToVideo, V::ImageToVideo, V::FirstFrame, V::LastFrame],
                audio_features: &[A::AutoSound],
                resolution: ResolutionSupport::presets(&["720p", "1080p", "4k"]),
                duration: DurationSupport::fixed(5, 10, &[5, 10]),
                fps: FpsSupport::only(&[30, 60], 30),
                ..ModelCapabilities::base("cogvideox-3", "CogVideoX-3")
            },
            ModelCapabilities {
                video_features: &[V::TextToVideo, V::ImageToVideo],
                resolution: ResolutionSupport::presets(&["720p", "1080p"]),
                duration: DurationSupport::fixed(5, 5, &[5]),
                fps: FpsSupport::only(&[30, 60], 30),
                ..ModelCapabilities::base("cogvideox-2", "CogVideoX-2")
            },
        ],
    },
    // Models behind an OpenAI-compatible gateway are not known up front.
    ProviderCapabilities {
        name: "openai",
        display_name: "OpenAI-compatible",
        supports_async: true,
        supports_cancel: false,
        supports_webhook: false,
        rate_limit_rpm: 60,
        concurrent_tasks: 5,
        models: &[],
    },
];

/// Find a provider's capabilities by name.
pub fn get_provider_capabilities(name: &str) -> Option<&'static ProviderCapabilities> {
    PROVIDER_CAPABILITIES.iter().find(|p| p.name == name)
}

/// Find a model's capabilities under a specific provider.
pub fn get_model_capabilities(provider: &str, model_id: &str) -> Option<&'static ModelCapabilities> {
    get_provider_capabilities(provider)?.get_model(model_id)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn seedance() -> &'static ModelCapabilities {
        get_model_capabilities("volcengine", "doubao-seedance-1-5-pro-251215").unwrap()
    }

    // ── Lookup ──

    #[test]
    fn test_lookup_known_provider() {
        let caps = get_provider_capabilities("volcengine").unwrap();
        assert!(caps.supports_cancel);
        assert_eq!(caps.models.len(), 2);
        assert_eq!(caps.rate_limit_rpm, 60);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(get_provider_capabilities("runway").is_none());
        assert!(get_model_capabilities("zhipu", "cogvideox-9").is_none());
        assert!(get_provider_capabilities("openai").unwrap().models.is_empty());
    }

    #[test]
    fn test_feature_queries() {
        let t2v = get_model_capabilities("aliyun", "wan2.5-t2v-turbo").unwrap();
        assert!(!t2v.has_img2video());
        assert!(!t2v.has_audio());

        let cog = get_model_capabilities("zhipu", "cogvideox-3").unwrap();
        assert!(cog.has_first_frame());
        assert!(cog.has_last_frame());
        assert!(cog.supports_audio(AudioFeature::AutoSound));
        assert!(!cog.supports(VideoFeature::MultiShot));
    }

    #[test]
    fn test_model_ids_in_order() {
        let caps = get_provider_capabilities("aliyun").unwrap();
        assert_eq!(
            caps.model_ids(),
            vec!["wan2.6-i2v-flash", "wan2.5-i2v-plus", "wan2.5-t2v-turbo"]
        );
    }

    // ── Coercion ──

    #[test]
    fn test_duration_nearest_allowed() {
        let d = DurationSupport::fixed(5, 10, &[5, 10]);
        assert_eq!(d.coerce(7), 5);
        assert_eq!(d.coerce(8), 10);
        assert_eq!(d.coerce(30), 10);
        assert_eq!(d.coerce(1), 5);
    }

    #[test]
    fn test_duration_tie_goes_to_first() {
        let d = DurationSupport::fixed(10, 20, &[10, 20]);
        assert_eq!(d.coerce(15), 10);
    }

    #[test]
    fn test_duration_clamped_without_allowed_values() {
        let d = DurationSupport::range(2, 15);
        assert_eq!(d.coerce(1), 2);
        assert_eq!(d.coerce(9), 9);
        assert_eq!(d.coerce(40), 15);
    }

    #[test]
    fn test_fps_closest() {
        let f = FpsSupport::only(&[30, 60], 30);
        assert_eq!(f.coerce(24), 30);
        assert_eq!(f.coerce(50), 60);
        assert_eq!(f.coerce(60), 60);
    }

    #[test]
    fn test_validate_params_unchanged() {
        let v = seedance().validate_params(5, "720p", 24, false, false);
        assert_eq!(v.duration, 5);
        assert_eq!(v.fps, 24);
        assert_eq!(v.resolution, "720p");
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn test_validate_params_coerces_duration() {
        let v = seedance().validate_params(7, "720p", 24, false, false);
        assert_eq!(v.duration, 5);
        assert_eq!(v.warnings, vec!["duration adjusted: 7s -> 5s"]);
    }

    #[test]
    fn test_validate_params_resolution_fallback() {
        let v = seedance().validate_params(5, "4k", 24, false, false);
        assert_eq!(v.resolution, "720p");

        let v = seedance().validate_params(5, "1080P", 24, false, false);
        assert_eq!(v.resolution, "1080P");
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn test_validate_params_frame_warnings_only() {
        let flash = get_model_capabilities("aliyun", "wan2.6-i2v-flash").unwrap();
        let v = flash.validate_params(5, "720p", 30, true, true);
        assert_eq!(v.warnings.len(), 1);
        assert!(v.warnings[0].contains("last-frame"));
    }
}
