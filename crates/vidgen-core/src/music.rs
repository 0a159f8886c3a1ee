//! Background music styles accepted with a generation request.

/// Every recognised style, in display order.
pub const MUSIC_STYLES: &[&str] = &[
    "cinematic",
    "upbeat",
    "calm",
    "dramatic",
    "romantic",
    "sad",
    "mysterious",
    "energetic",
    "peaceful",
    "epic",
];

/// Default playback volume (0.0 – 1.0).
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.5;

pub fn is_valid_music_style(style: &str) -> bool {
    MUSIC_STYLES.contains(&style.trim().to_lowercase().as_str())
}

/// Short English description of a style, if known.
pub fn describe_music_style(style: &str) -> Option<&'static str> {
    let desc = match style.trim().to_lowercase().as_str() {
        "cinematic" => "epic, atmospheric",
        "upbeat" => "lively, positive",
        "calm" => "soothing, relaxed",
        "dramatic" => "tense, conflicted",
        "romantic" => "warm, tender",
        "sad" => "melancholic",
        "mysterious" => "suspenseful, exploratory",
        "energetic" => "sporty, passionate",
        "peaceful" => "natural, meditative",
        "epic" => "grand, overwhelming",
        _ => return None,
    };
    Some(desc)
}
