//! Resolution strings: named presets (`720p`) and custom `WxH` sizes.

use thiserror::Error;

/// Smallest accepted side of a custom resolution, in pixels.
pub const MIN_SIZE: u32 = 200;
/// Largest accepted side of a custom resolution, in pixels.
pub const MAX_SIZE: u32 = 4096;

/// Named presets and their pixel sizes.
pub const PRESET_RESOLUTIONS: &[(&str, (u32, u32))] = &[
    ("720p", (1280, 720)),
    ("1080p", (1920, 1080)),
    ("480p", (854, 480)),
    ("4k", (3840, 2160)),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("unrecognised resolution '{0}'")]
    Unrecognised(String),
    #[error("resolution {width}x{height} is outside {MIN_SIZE}..={MAX_SIZE}")]
    OutOfRange { width: u32, height: u32 },
}

/// Whether `s` looks like `<width>x<height>`.
pub fn is_custom_resolution(s: &str) -> bool {
    split_custom(s).is_some()
}

fn split_custom(s: &str) -> Option<(u32, u32)> {
    let lower = s.trim().to_lowercase();
    let (w, h) = lower.split_once('x')?;
    if w.is_empty() || h.is_empty() || !w.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !h.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Resolve a preset name or custom size to `(width, height)`.
pub fn parse_resolution(s: &str) -> Result<(u32, u32), ResolutionError> {
    let lower = s.trim().to_lowercase();
    if let Some((_, size)) = PRESET_RESOLUTIONS.iter().find(|(name, _)| *name == lower) {
        return Ok(*size);
    }

    let (width, height) =
        split_custom(&lower).ok_or_else(|| ResolutionError::Unrecognised(s.to_string()))?;
    let in_range = |v: u32| (MIN_SIZE..=MAX_SIZE).contains(&v);
    if !in_range(width) || !in_range(height) {
        return Err(ResolutionError::OutOfRange { width, height });
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(parse_resolution("720p"), Ok((1280, 720)));
        assert_eq!(parse_resolution("1080P"), Ok((1920, 1080)));
        assert_eq!(parse_resolution(" 4K "), Ok((3840, 2160)));
    }

    #[test]
    fn test_custom_sizes() {
        assert!(is_custom_resolution("1024x576"));
        assert!(is_custom_resolution("1024X576"));
        assert!(!is_custom_resolution("720p"));
        assert!(!is_custom_resolution("x576"));
        assert_eq!(parse_resolution("1024x576"), Ok((1024, 576)));
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            parse_resolution("100x576"),
            Err(ResolutionError::OutOfRange {
                width: 100,
                height: 576
            })
        );
        assert!(parse_resolution("8192x4320").is_err());
    }

    #[test]
    fn test_garbage() {
        assert!(matches!(
            parse_resolution("huge"),
            Err(ResolutionError::Unrecognised(_))
        ));
    }
}
