//! Runs one claimed task end to end against the fetcher.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::artifact::{find_artifact, output_template};
use super::guard::WorkerGuard;
use crate::error::QueueError;
use crate::fetcher::{select_format, Fetcher, Invocation, RunOutcome, Transcoder};
use crate::parse::parse_line;
use crate::sanitize::stem_or;
use crate::store::{ProgressRecord, Task, TaskKind, TaskStore};

/// Everything a worker needs besides its task. Shared by all workers.
pub struct WorkerContext {
    pub store: Arc<TaskStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub transcoder: Arc<dyn Transcoder>,
    pub audio_format: String,
    pub title_probe_timeout: Duration,
    pub download_timeout: Option<Duration>,
}

/// Drive `task` (already `downloading`) to a terminal state.
pub(super) async fn run_worker(ctx: Arc<WorkerContext>, task: Task) {
    let mut guard = WorkerGuard::new(Arc::clone(&ctx.store), task.id.clone());
    tracing::info!(task_id = %task.id, url = %task.url, "download started");

    let record = match execute(&ctx, &task).await {
        Ok(record) => record,
        Err(e) => ProgressRecord::failed(e.to_string()),
    };
    let status = record.status;

    if let Err(e) = ctx.store.finish(&task.id, record) {
        tracing::warn!(task_id = %task.id, error = %e, "could not record terminal state");
    } else {
        tracing::info!(task_id = %task.id, status = status.as_str(), "download finished");
    }
    guard.disarm();
}

async fn execute(ctx: &WorkerContext, task: &Task) -> Result<ProgressRecord, QueueError> {
    if !ctx.fetcher.is_available() {
        return Err(QueueError::DependencyMissing(format!(
            "{} is not installed",
            ctx.fetcher.name()
        )));
    }
    if !ctx.transcoder.is_available() {
        return Err(QueueError::DependencyMissing(format!(
            "{} is not installed",
            ctx.transcoder.name()
        )));
    }

    let stem = resolve_stem(ctx, task).await;
    let invocation = Invocation {
        url: task.url.clone(),
        format: select_format(&task.format_id, task.audio_only, &ctx.audio_format),
        output_template: output_template(&task.destination, &stem, task.kind),
        playlist: task.kind == TaskKind::Playlist,
    };
    if let Err(e) = tokio::fs::create_dir_all(&task.destination).await {
        return Err(QueueError::ExecutionFailure(format!(
            "cannot create {}: {e}",
            task.destination.display()
        )));
    }

    let outcome = match ctx.download_timeout {
        Some(limit) => tokio::time::timeout(limit, drive(ctx, task, &invocation))
            .await
            .map_err(|_| QueueError::Timeout("download".to_string()))??,
        None => drive(ctx, task, &invocation).await?,
    };

    if !outcome.success() {
        return Err(QueueError::ExecutionFailure(failure_message(&outcome)));
    }

    match task.kind {
        // No single artifact to check; a zero exit completes the run.
        TaskKind::Playlist => Ok(ProgressRecord::completed(stem)),
        TaskKind::Single => {
            let path = find_artifact(&task.destination, &stem)
                .await
                .ok_or(QueueError::ArtifactMissing)?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or(QueueError::ArtifactMissing)?;
            Ok(ProgressRecord::completed(filename))
        }
    }
}

/// Filename stem: the caller's title hint, else the probed title, else the id.
/// The probe is best effort and bounded by its own timeout.
async fn resolve_stem(ctx: &WorkerContext, task: &Task) -> String {
    if let Some(title) = task.title.as_deref() {
        return stem_or(Some(title), &task.id);
    }
    match ctx.fetcher.probe(&task.url, ctx.title_probe_timeout).await {
        Ok(info) => stem_or(info.title.as_deref(), &task.id),
        Err(e) => {
            tracing::warn!(task_id = %task.id, error = %e, "title probe failed, using task id");
            task.id.clone()
        }
    }
}

/// Run the fetcher while feeding its diagnostic lines into the store.
async fn drive(
    ctx: &WorkerContext,
    task: &Task,
    invocation: &Invocation,
) -> Result<RunOutcome, QueueError> {
    let (tx, mut rx) = mpsc::channel::<String>(256);
    let consume = async {
        while let Some(line) = rx.recv().await {
            ctx.store.update_progress(&task.id, |record| {
                parse_line(&line, record).apply(record);
            });
        }
    };
    let (outcome, ()) = tokio::join!(ctx.fetcher.run(invocation, tx), consume);
    outcome.map_err(|e| QueueError::ExecutionFailure(e.to_string()))
}

/// Error detail for a non-zero exit: the diagnostic lines carrying an explicit
/// error marker, else a generic message with the exit code.
pub fn failure_message(outcome: &RunOutcome) -> String {
    let marked: Vec<&str> = outcome
        .diagnostics
        .lines()
        .filter(|l| l.contains("ERROR"))
        .collect();
    if marked.is_empty() {
        format!("download failed with code {}", outcome.exit_code)
    } else {
        marked.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_prefers_error_lines() {
        let outcome = RunOutcome {
            exit_code: 1,
            diagnostics: "WARNING: slow\nERROR: [youtube] abc: Video unavailable".to_string(),
        };
        assert_eq!(
            failure_message(&outcome),
            "ERROR: [youtube] abc: Video unavailable"
        );
    }

    #[test]
    fn failure_without_marker_uses_code() {
        let outcome = RunOutcome {
            exit_code: 2,
            diagnostics: "something odd".to_string(),
        };
        assert_eq!(failure_message(&outcome), "download failed with code 2");
    }
}
