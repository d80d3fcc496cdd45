//! Presence checks for the external tools.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::Transcoder;

/// True when `program` resolves to an executable (on `PATH` or as a path).
pub fn fetcher_available(program: &str) -> bool {
    which::which(program).is_ok()
}

/// The local transcoder, either bundled in a known directory or on `PATH`.
#[derive(Debug, Clone)]
pub struct SystemTranscoder {
    program: String,
    bundled_dir: Option<PathBuf>,
}

impl SystemTranscoder {
    pub fn new(program: impl Into<String>, bundled_dir: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            bundled_dir,
        }
    }

    /// Where the transcoder was found, bundled directory first.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.bundled_dir {
            if let Some(found) = find_in_dir(dir, &self.program) {
                return Some(found);
            }
        }
        which::which(&self.program).ok()
    }
}

fn find_in_dir(dir: &Path, program: &str) -> Option<PathBuf> {
    [program.to_string(), format!("{program}.exe")]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

impl Transcoder for SystemTranscoder {
    fn name(&self) -> &str {
        &self.program
    }

    fn is_available(&self) -> bool {
        self.locate().is_some()
    }

    fn location(&self) -> Option<PathBuf> {
        self.locate()
    }
}

/// Dependency report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub fetcher: bool,
    pub transcoder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcoder_path: Option<PathBuf>,
}

impl ToolStatus {
    pub fn ready(&self) -> bool {
        self.fetcher && self.transcoder
    }
}
