//! Scripted collaborators and helpers shared by the engine integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use zdl_core::config::ZdlConfig;
use zdl_core::fetcher::{Fetcher, Invocation, MediaEntry, MediaInfo, RunOutcome, Transcoder};
use zdl_core::{Engine, FetchError};

/// Fetcher double: replays scripted lines, optionally waits on a gate, writes
/// the output file it was told to produce and exits with a chosen code.
pub struct FakeFetcher {
    pub title: Option<String>,
    pub lines: Vec<String>,
    pub exit_code: i32,
    pub diagnostics: String,
    /// Extension of the file to create from the output template.
    pub produce: Option<&'static str>,
    /// When set, each run (and each playlist probe) waits for one permit.
    pub gate: Option<Arc<Semaphore>>,
    pub entries: usize,
    pub panic_on_run: bool,
    pub available: bool,
    pub runs: AtomicUsize,
    pub probes: AtomicUsize,
}

impl Default for FakeFetcher {
    fn default() -> Self {
        Self {
            title: Some("Sample Clip".to_string()),
            lines: Vec::new(),
            exit_code: 0,
            diagnostics: String::new(),
            produce: Some("mp4"),
            gate: None,
            entries: 0,
            panic_on_run: false,
            available: true,
            runs: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        }
    }
}

impl FakeFetcher {
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (fetcher, gate)
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

pub fn entry(i: usize) -> MediaEntry {
    MediaEntry {
        id: format!("v{i}"),
        title: Some(format!("Video {i}")),
        thumbnail: None,
        duration: "1m 0s".to_string(),
        url: Some(format!("https://example.com/watch?v=v{i}")),
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    fn name(&self) -> &str {
        "fake-fetcher"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn probe(&self, url: &str, _timeout: Duration) -> Result<MediaInfo, FetchError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match &self.title {
            Some(title) => Ok(MediaInfo {
                id: url.rsplit('=').next().unwrap_or_default().to_string(),
                title: Some(title.clone()),
                thumbnail: None,
                duration: "1m 0s".to_string(),
                uploader: None,
                view_count: None,
                formats: Vec::new(),
            }),
            None => Err(FetchError::Exit {
                code: 1,
                message: "ERROR: unavailable".to_string(),
            }),
        }
    }

    async fn probe_playlist(
        &self,
        _url: &str,
        max_items: usize,
        _timeout: Duration,
        entries: mpsc::Sender<MediaEntry>,
    ) -> Result<usize, FetchError> {
        let mut sent = 0;
        for i in 0..self.entries {
            if sent >= max_items {
                break;
            }
            if i == 1 {
                self.pass_gate().await;
            }
            if entries.send(entry(i)).await.is_err() {
                break;
            }
            sent += 1;
        }
        Ok(sent)
    }

    async fn run(
        &self,
        invocation: &Invocation,
        lines: mpsc::Sender<String>,
    ) -> Result<RunOutcome, FetchError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_run {
            panic!("scripted fetcher failure");
        }
        for line in &self.lines {
            let _ = lines.send(line.clone()).await;
        }
        self.pass_gate().await;

        if let Some(ext) = self.produce {
            let path = invocation
                .output_template
                .to_string_lossy()
                .replace("%(ext)s", ext)
                .replace("%(playlist_index)s", "1")
                .replace("%(title)s", "first");
            let path = PathBuf::from(path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, b"media").unwrap();
        }
        Ok(RunOutcome {
            exit_code: self.exit_code,
            diagnostics: self.diagnostics.clone(),
        })
    }
}

pub struct FakeTranscoder(pub bool);

impl Transcoder for FakeTranscoder {
    fn name(&self) -> &str {
        "fake-transcoder"
    }

    fn is_available(&self) -> bool {
        self.0
    }
}

pub fn test_config(download_dir: &Path, max_concurrent: usize) -> ZdlConfig {
    ZdlConfig {
        download_dir: Some(download_dir.to_path_buf()),
        max_concurrent_downloads: max_concurrent,
        heartbeat_interval_ms: 10,
        title_probe_timeout_secs: 1,
        info_probe_timeout_secs: 1,
        ..ZdlConfig::default()
    }
}

pub fn engine(config: ZdlConfig, fetcher: FakeFetcher) -> (Engine, Arc<FakeFetcher>) {
    let fetcher = Arc::new(fetcher);
    let engine = Engine::with_collaborators(
        config,
        Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        Arc::new(FakeTranscoder(true)),
    );
    (engine, fetcher)
}

/// Poll `cond` until it holds; panics after five seconds.
pub async fn wait_until<F: FnMut() -> bool>(mut cond: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
