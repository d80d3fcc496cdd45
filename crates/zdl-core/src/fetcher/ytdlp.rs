//! yt-dlp process adapter.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::info::{parse_entry_line, parse_info_json, MediaEntry, MediaInfo};
use super::{Fetcher, Invocation, RunOutcome};
use crate::error::FetchError;
use crate::parse::LineSplitter;

/// Diagnostic lines kept for error reporting after a failed run.
const DIAGNOSTIC_TAIL: usize = 20;

/// Runs the fetcher executable as a child process.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
    transcoder_dir: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            transcoder_dir: None,
        }
    }

    /// Bundled transcoder location: prepended to `PATH` of every child and
    /// passed as `--ffmpeg-location` to downloads.
    pub fn with_transcoder_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.transcoder_dir = dir;
        self
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.transcoder_dir {
            cmd.env("PATH", prepend_path(dir));
        }
        cmd
    }

    fn spawn(&self, args: &[String]) -> Result<Child, FetchError> {
        self.command(args).spawn().map_err(|source| FetchError::Spawn {
            program: self.program.clone(),
            source,
        })
    }
}

fn prepend_path(dir: &Path) -> OsString {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths).unwrap_or_else(|_| dir.as_os_str().to_os_string())
}

/// Arguments for a single-item metadata dump.
pub fn probe_args(url: &str) -> Vec<String> {
    [
        "--dump-json",
        "--no-download",
        "--no-playlist",
        "-q",
        url,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Arguments for enumerating up to `max_items` playlist members, one JSON
/// document per line.
pub fn playlist_args(url: &str, max_items: usize) -> Vec<String> {
    vec![
        "--dump-json".to_string(),
        "--flat-playlist".to_string(),
        "--yes-playlist".to_string(),
        "--playlist-end".to_string(),
        max_items.max(1).to_string(),
        "-q".to_string(),
        url.to_string(),
    ]
}

/// Arguments for a download run.
pub fn download_args(invocation: &Invocation, transcoder_dir: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "--format".to_string(),
        invocation.format.selector.clone(),
        "--output".to_string(),
        invocation.output_template.to_string_lossy().into_owned(),
    ];
    if let Some(codec) = &invocation.format.extract_audio {
        args.extend([
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            codec.clone(),
            "--audio-quality".to_string(),
            "0".to_string(),
        ]);
    }
    if let Some(container) = &invocation.format.merge_container {
        args.extend(["--merge-output-format".to_string(), container.clone()]);
    }
    args.push(if invocation.playlist {
        "--yes-playlist".to_string()
    } else {
        "--no-playlist".to_string()
    });
    args.extend(["-q".to_string(), "--progress".to_string()]);
    if let Some(dir) = transcoder_dir {
        args.extend([
            "--ffmpeg-location".to_string(),
            dir.to_string_lossy().into_owned(),
        ]);
    }
    args.push(invocation.url.clone());
    args
}

/// Read `rd` to EOF, forwarding every `\r`/`\n`-terminated line to `lines`.
/// With `keep_tail` the last lines are also returned for error reporting.
fn pump<R>(
    mut rd: R,
    label: &'static str,
    lines: mpsc::Sender<String>,
    keep_tail: bool,
) -> JoinHandle<Result<VecDeque<String>, FetchError>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 8 * 1024];
        let mut splitter = LineSplitter::new();
        let mut tail = VecDeque::new();

        loop {
            let n = rd
                .read(&mut buf)
                .await
                .map_err(|source| FetchError::Io { stream: label, source })?;
            let chunk = if n == 0 {
                std::mem::take(&mut splitter).finish().into_iter().collect()
            } else {
                splitter.push(&buf[..n])
            };
            for line in chunk {
                if keep_tail {
                    if tail.len() == DIAGNOSTIC_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line.clone());
                }
                // A closed receiver only means nobody is watching progress.
                let _ = lines.send(line).await;
            }
            if n == 0 {
                break;
            }
        }
        Ok(tail)
    })
}

async fn collect_stderr<R>(mut rd: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    let _ = rd.read_to_end(&mut bytes).await;
    String::from_utf8_lossy(&bytes).trim().to_string()
}

#[async_trait]
impl Fetcher for YtDlp {
    fn name(&self) -> &str {
        &self.program
    }

    fn is_available(&self) -> bool {
        super::tools::fetcher_available(&self.program)
    }

    async fn probe(&self, url: &str, timeout: Duration) -> Result<MediaInfo, FetchError> {
        let child = self.spawn(&probe_args(url))?;
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| FetchError::Timeout(timeout.as_secs()))?
            .map_err(|source| FetchError::Io {
                stream: "stdout",
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(FetchError::Exit {
                code: output.status.code().unwrap_or(-1),
                message: if stderr.is_empty() {
                    "failed to fetch video info".to_string()
                } else {
                    stderr
                },
            });
        }
        parse_info_json(&stdout)
    }

    async fn probe_playlist(
        &self,
        url: &str,
        max_items: usize,
        timeout: Duration,
        entries: mpsc::Sender<MediaEntry>,
    ) -> Result<usize, FetchError> {
        let mut child = self.spawn(&playlist_args(url, max_items))?;
        let mut stdout = child.stdout.take().ok_or_else(|| FetchError::Io {
            stream: "stdout",
            source: std::io::Error::other("stdout not captured"),
        })?;
        let stderr = child.stderr.take().map(|rd| tokio::spawn(collect_stderr(rd)));

        let enumerate = async {
            let mut buf = vec![0u8; 8 * 1024];
            let mut splitter = LineSplitter::new();
            let mut sent = 0usize;
            'read: loop {
                let n = stdout
                    .read(&mut buf)
                    .await
                    .map_err(|source| FetchError::Io {
                        stream: "stdout",
                        source,
                    })?;
                let lines = if n == 0 {
                    std::mem::take(&mut splitter).finish().into_iter().collect()
                } else {
                    splitter.push(&buf[..n])
                };
                for line in lines {
                    if sent >= max_items {
                        break 'read;
                    }
                    let Some(entry) = parse_entry_line(&line) else {
                        continue;
                    };
                    if entries.send(entry).await.is_err() {
                        break 'read;
                    }
                    sent += 1;
                }
                if n == 0 || sent >= max_items {
                    break;
                }
            }
            Ok::<usize, FetchError>(sent)
        };

        let sent = tokio::time::timeout(timeout, enumerate)
            .await
            .map_err(|_| FetchError::Timeout(timeout.as_secs()))??;

        if sent >= max_items || entries.is_closed() {
            let _ = child.kill().await;
            return Ok(sent);
        }

        let status = child.wait().await.map_err(|source| FetchError::Io {
            stream: "stdout",
            source,
        })?;
        if sent == 0 && !status.success() {
            let message = match stderr {
                Some(handle) => handle.await.unwrap_or_default(),
                None => String::new(),
            };
            return Err(FetchError::Exit {
                code: status.code().unwrap_or(-1),
                message: if message.is_empty() {
                    "failed to list playlist".to_string()
                } else {
                    message
                },
            });
        }
        Ok(sent)
    }

    async fn run(
        &self,
        invocation: &Invocation,
        lines: mpsc::Sender<String>,
    ) -> Result<RunOutcome, FetchError> {
        let args = download_args(invocation, self.transcoder_dir.as_deref());
        tracing::debug!(program = %self.program, ?args, "starting fetcher");
        let mut child = self.spawn(&args)?;

        let stdout = child.stdout.take().map(|rd| pump(rd, "stdout", lines.clone(), false));
        let stderr = child.stderr.take().map(|rd| pump(rd, "stderr", lines, true));

        let status = child.wait().await.map_err(|source| FetchError::Io {
            stream: "stdout",
            source,
        })?;

        if let Some(handle) = stdout {
            join_pump(handle).await?;
        }
        let tail = match stderr {
            Some(handle) => join_pump(handle).await?,
            None => VecDeque::new(),
        };

        Ok(RunOutcome {
            exit_code: status.code().unwrap_or(-1),
            diagnostics: Vec::from(tail).join("\n"),
        })
    }
}

async fn join_pump(
    handle: JoinHandle<Result<VecDeque<String>, FetchError>>,
) -> Result<VecDeque<String>, FetchError> {
    match handle.await {
        Ok(res) => res,
        Err(e) => Err(FetchError::Io {
            stream: "pump",
            source: std::io::Error::other(e.to_string()),
        }),
    }
}
