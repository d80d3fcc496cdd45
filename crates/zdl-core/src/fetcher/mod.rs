//! Collaborator boundary for the external retrieval tool.
//!
//! The engine only talks to [`Fetcher`] and [`Transcoder`]; [`YtDlp`] and
//! [`SystemTranscoder`] are the production implementations, tests plug in
//! scripted doubles.

mod format;
mod info;
mod tools;
mod ytdlp;

pub use format::{select_format, FormatSelection};
pub use info::{
    classify_url, format_duration, parse_entry_line, parse_info_json, InfoResult, MediaEntry,
    MediaFormat, MediaInfo, UrlClass,
};
pub use tools::{fetcher_available, SystemTranscoder, ToolStatus};
pub use ytdlp::YtDlp;

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::FetchError;

/// One download/transcode invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub url: String,
    pub format: FormatSelection,
    /// Output template; `%(ext)s` (and in playlist mode `%(playlist_index)s`,
    /// `%(title)s`) are expanded by the fetcher.
    pub output_template: PathBuf,
    pub playlist: bool,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: i32,
    /// Tail of the diagnostic stream, newline-joined.
    pub diagnostics: String,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Program name used in dependency messages.
    fn name(&self) -> &str;

    /// Whether the tool can be launched at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Metadata dump for a single item.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<MediaInfo, FetchError>;

    /// Enumerate playlist/channel members, sending each entry as soon as it is
    /// decoded. Stops after `max_items` entries or when `entries` is closed.
    /// Returns the number of entries sent.
    async fn probe_playlist(
        &self,
        url: &str,
        max_items: usize,
        timeout: Duration,
        entries: mpsc::Sender<MediaEntry>,
    ) -> Result<usize, FetchError>;

    /// Run a download to completion. Every diagnostic line (carriage-return
    /// redraws included) is sent to `lines` while the child runs.
    async fn run(
        &self,
        invocation: &Invocation,
        lines: mpsc::Sender<String>,
    ) -> Result<RunOutcome, FetchError>;
}

/// Local transcoder presence check, consumed as a precondition only.
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;

    /// Resolved executable, when known.
    fn location(&self) -> Option<PathBuf> {
        None
    }
}
