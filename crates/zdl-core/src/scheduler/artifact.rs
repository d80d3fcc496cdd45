//! Output paths: the template handed to the fetcher and the probe for what it
//! actually produced.

use std::path::{Path, PathBuf};

use crate::store::TaskKind;

/// Extensions checked after a successful single-item run, in preference order.
pub const ARTIFACT_EXTENSIONS: [&str; 5] = ["mp3", "mp4", "mkv", "webm", "m4a"];

/// `<dest>/<stem>.%(ext)s`, or for playlists a directory named after the stem
/// holding `%(playlist_index)s - %(title)s.%(ext)s`.
pub fn output_template(destination: &Path, stem: &str, kind: TaskKind) -> PathBuf {
    match kind {
        TaskKind::Single => destination.join(format!("{stem}.%(ext)s")),
        TaskKind::Playlist => destination
            .join(stem)
            .join("%(playlist_index)s - %(title)s.%(ext)s"),
    }
}

/// First existing `<dest>/<stem>.<ext>` in preference order.
pub async fn find_artifact(destination: &Path, stem: &str) -> Option<PathBuf> {
    for ext in ARTIFACT_EXTENSIONS {
        let candidate = destination.join(format!("{stem}.{ext}"));
        if tokio::fs::metadata(&candidate)
            .await
            .is_ok_and(|m| m.is_file())
        {
            return Some(candidate);
        }
    }
    None
}
