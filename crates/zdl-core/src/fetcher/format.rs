//! Format selector construction for the fetcher.

/// Selector used when the request asks for `best`.
const BEST_VIDEO: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
const BEST_AUDIO: &str = "bestaudio/best";

/// Fully resolved format request passed to the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    /// Value for `-f`.
    pub selector: String,
    /// Target codec when audio is extracted and re-encoded.
    pub extract_audio: Option<String>,
    /// Container for merged video+audio output.
    pub merge_container: Option<String>,
}

/// Build the fallback chain for a request.
///
/// An explicit id is paired with the best m4a audio, widened to any audio,
/// then to a webm pair and finally to whatever single file is best, so a
/// request never fails only because the first-choice pair is missing.
pub fn select_format(format_id: &str, audio_only: bool, audio_format: &str) -> FormatSelection {
    if audio_only {
        return FormatSelection {
            selector: BEST_AUDIO.to_string(),
            extract_audio: Some(audio_format.to_string()),
            merge_container: None,
        };
    }

    let id = format_id.trim();
    let selector = if id.is_empty() || id == "best" {
        BEST_VIDEO.to_string()
    } else {
        format!(
            "{id}+bestaudio[ext=m4a]/{id}+bestaudio/bestvideo[ext=webm]+bestaudio/best[ext=mp4]/best"
        )
    };
    FormatSelection {
        selector,
        extract_audio: None,
        merge_container: Some("mp4".to_string()),
    }
}
