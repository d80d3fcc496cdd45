use async_stream::stream;
use futures::Stream;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::store::{ProgressRecord, TaskId, TaskStore};

/// One push to a progress subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TaskEvent {
    /// Current record, sent on every heartbeat even when unchanged.
    Snapshot(ProgressRecord),
    /// The task does not exist (or no longer exists). Always the last event.
    Unknown,
}

/// Subscribe to a task's progress.
///
/// Emits the current record immediately and then once per `heartbeat`.
/// The stream ends after:
/// - a terminal record (`completed` / `error`), which is the last snapshot;
/// - a single `Unknown` when the task is absent;
/// - a snapshot at 100% whose status was already seen in an earlier
///   snapshot, so a run that never reports a terminal state cannot keep the
///   subscriber open forever.
pub fn task_events(
    store: Arc<TaskStore>,
    task_id: TaskId,
    heartbeat: Duration,
) -> impl Stream<Item = TaskEvent> + Send + 'static {
    stream! {
        let mut ticker = tokio::time::interval(heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seen = HashSet::new();

        loop {
            ticker.tick().await;
            let record = match store.progress(&task_id) {
                Some(record) => record,
                None => {
                    yield TaskEvent::Unknown;
                    break;
                }
            };

            let terminal = record.is_terminal();
            let stalled = record.progress == 100 && !seen.insert(record.status);
            yield TaskEvent::Snapshot(record);
            if terminal || stalled {
                break;
            }
        }
    }
}
