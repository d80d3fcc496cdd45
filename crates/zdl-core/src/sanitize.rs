//! Title to filename-stem sanitization.

/// Characters that are rejected by at least one common filesystem.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum stem length in characters (the extension is appended later).
const MAX_STEM_CHARS: usize = 100;

/// Turns a media title into a filename stem that is safe on Linux, macOS and Windows.
///
/// - Drops `<>:"/\|?*` and control characters
/// - Trims surrounding whitespace and dots
/// - Caps the result at 100 characters
///
/// Returns an empty string when nothing usable remains; callers fall back to the task id.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !INVALID_CHARS.contains(c) && !c.is_control())
        .collect();

    let trimmed = cleaned.trim_matches(|c: char| c.is_whitespace() || c == '.');

    match trimmed.char_indices().nth(MAX_STEM_CHARS) {
        Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// Sanitized stem for `title`, or `fallback` when the title sanitizes to nothing.
pub fn stem_or(title: Option<&str>, fallback: &str) -> String {
    title
        .map(sanitize_title)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
