//! `zdl get <url>...` – queue downloads and follow them to completion.

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use zdl_core::config::ZdlConfig;
use zdl_core::publish::TaskEvent;
use zdl_core::store::{ProgressRecord, ProgressStatus, TaskKind, TaskRequest};
use zdl_core::Engine;

#[derive(Debug, Default)]
pub struct GetArgs {
    pub urls: Vec<String>,
    pub from_file: Option<PathBuf>,
    pub format: Option<String>,
    pub audio: bool,
    pub playlist: bool,
    pub dest: Option<PathBuf>,
    pub title: Option<String>,
    pub jobs: Option<usize>,
    pub json: bool,
}

/// URLs from the command line followed by those in `--from-file`.
pub(crate) fn collect_urls(urls: &[String], file_contents: Option<&str>) -> Vec<String> {
    let from_file = file_contents
        .into_iter()
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));
    urls.iter()
        .map(|u| u.trim())
        .chain(from_file)
        .map(String::from)
        .collect()
}

pub async fn run_get(mut cfg: ZdlConfig, args: GetArgs) -> Result<bool> {
    let file_contents = match &args.from_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read URL list {}", path.display()))?,
        ),
        None => None,
    };
    let urls = collect_urls(&args.urls, file_contents.as_deref());
    if urls.is_empty() {
        bail!("no URLs given");
    }
    if args.title.is_some() && urls.len() > 1 {
        bail!("--title can only be used with a single URL");
    }
    if let Some(jobs) = args.jobs {
        cfg.max_concurrent_downloads = jobs;
    }

    let engine = Engine::new(cfg);
    let kind = if args.playlist {
        TaskKind::Playlist
    } else {
        TaskKind::Single
    };

    let mut ids = Vec::with_capacity(urls.len());
    for url in urls {
        let receipt = engine.enqueue(TaskRequest {
            url,
            format_id: args.format.clone(),
            audio_only: args.audio,
            destination: args.dest.clone(),
            title: args.title.clone(),
            kind,
        })?;
        if !args.json {
            println!("queued {} (position {})", short(&receipt.task_id), receipt.queue_position);
        }
        ids.push(receipt.task_id);
    }
    let admitted = engine.start().await;
    tracing::debug!(admitted, queued = ids.len(), "processing started");

    let streams = ids.iter().map(|id| {
        let id = id.clone();
        engine.subscribe(&id).map(move |event| (id.clone(), event)).boxed()
    });
    let mut events = stream::select_all(streams);
    let mut last: HashMap<String, ProgressRecord> = HashMap::new();
    while let Some((id, event)) = events.next().await {
        if args.json {
            println!(
                "{}",
                serde_json::json!({ "task_id": id, "event": event })
            );
        }
        if let TaskEvent::Snapshot(record) = event {
            if !args.json && last.get(&id) != Some(&record) {
                println!("{}", render(&id, &record));
            }
            last.insert(id, record);
        }
    }

    // A subscription can close early on a stalled 100% record; wait for the
    // real terminal state before reporting.
    let heartbeat = engine.config().heartbeat();
    while ids
        .iter()
        .any(|id| engine.progress(id).is_some_and(|r| !r.is_terminal()))
    {
        tokio::time::sleep(heartbeat).await;
    }

    let mut failed = 0usize;
    for id in &ids {
        let Some(record) = engine.progress(id) else {
            continue;
        };
        if record.status == ProgressStatus::Error {
            failed += 1;
        }
        if !args.json && last.get(id) != Some(&record) {
            println!("{}", render(id, &record));
        }
    }
    if !args.json {
        println!("{} done, {} failed", ids.len() - failed, failed);
    }
    Ok(failed == 0)
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// One status line per snapshot.
pub(crate) fn render(id: &str, record: &ProgressRecord) -> String {
    let mut line = format!(
        "[{}] {:<14} {:>3}%",
        short(id),
        record.status.as_str(),
        record.progress
    );
    if let (Some(current), Some(total)) = (record.current_item, record.total_items) {
        line.push_str(&format!("  item {current}/{total}"));
    }
    if let Some(downloaded) = &record.downloaded {
        line.push_str(&format!("  {downloaded}"));
    }
    if let Some(speed) = &record.speed {
        line.push_str(&format!("  {speed}"));
    }
    if let Some(filename) = &record.filename {
        line.push_str(&format!("  -> {filename}"));
    }
    if let Some(error) = &record.error {
        line.push_str(&format!("  {error}"));
    }
    line
}
