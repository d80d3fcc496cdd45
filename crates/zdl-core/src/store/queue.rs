//! Backlog operations: enqueue, claim, mark, remove, clear, listing.

use std::path::Path;

use super::types::{
    ClearFilter, EnqueueReceipt, ProgressRecord, QueueCounts, QueueEntry, QueueSnapshot,
    QueueStatus, Task, TaskId, TaskRequest,
};
use super::{Entry, TaskStore};
use crate::error::QueueError;

impl TaskStore {
    /// Validate and insert a new `pending` task with a provisional `pending`
    /// progress record. Missing inputs are filled from the current settings
    /// and `default_dir`.
    ///
    /// The returned position is the task's 1-based place in the backlog.
    pub fn enqueue(
        &self,
        request: TaskRequest,
        default_dir: &Path,
    ) -> Result<EnqueueReceipt, QueueError> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(QueueError::InvalidInput("please enter a URL".to_string()));
        }
        if url.chars().any(char::is_whitespace) {
            return Err(QueueError::InvalidInput(format!("malformed URL: {url}")));
        }

        let id: TaskId = uuid::Uuid::new_v4().to_string();
        let mut inner = self.lock();
        let format_id = request
            .format_id
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| inner.settings.default_quality.clone());
        let added_at = inner.next_seq;
        inner.next_seq += 1;

        let task = Task {
            id: id.clone(),
            url: url.to_string(),
            format_id,
            audio_only: request.audio_only,
            destination: request
                .destination
                .unwrap_or_else(|| default_dir.to_path_buf()),
            title: request.title.filter(|t| !t.trim().is_empty()),
            kind: request.kind,
            queue_status: QueueStatus::Pending,
            added_at,
        };
        inner.order.insert(added_at, id.clone());
        inner.entries.insert(
            id.clone(),
            Entry {
                task,
                record: ProgressRecord::pending(),
            },
        );
        let queue_position = inner.count(QueueStatus::Pending);
        tracing::debug!(task_id = %id, queue_position, "task enqueued");

        Ok(EnqueueReceipt {
            task_id: id,
            queue_position,
        })
    }

    /// Up to `n` oldest pending tasks (FIFO by `added_at`), without claiming them.
    pub fn pending(&self, n: usize) -> Vec<Task> {
        let inner = self.lock();
        inner
            .order
            .values()
            .filter_map(|id| inner.entries.get(id))
            .filter(|e| e.task.queue_status == QueueStatus::Pending)
            .take(n)
            .map(|e| e.task.clone())
            .collect()
    }

    /// Atomically move up to `n` oldest pending tasks to `downloading`, never
    /// exceeding the concurrency cap. The claimed tasks are returned in FIFO
    /// order; each must be handed to exactly one worker.
    pub fn claim_pending(&self, n: usize) -> Vec<Task> {
        let mut inner = self.lock();
        let active = inner.count(QueueStatus::Downloading);
        let slots = inner.settings.max_concurrent.saturating_sub(active).min(n);
        if slots == 0 {
            return Vec::new();
        }

        let ids: Vec<TaskId> = inner
            .order
            .values()
            .filter(|id| {
                inner
                    .entries
                    .get(id.as_str())
                    .is_some_and(|e| e.task.queue_status == QueueStatus::Pending)
            })
            .take(slots)
            .cloned()
            .collect();

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = inner.entries.get_mut(&id) {
                entry.task.queue_status = QueueStatus::Downloading;
                entry.record = ProgressRecord::downloading();
                claimed.push(entry.task.clone());
            }
        }
        claimed
    }

    /// Number of tasks currently `downloading`.
    pub fn active_count(&self) -> usize {
        self.lock().count(QueueStatus::Downloading)
    }

    /// Free execution slots under the current cap (0 when saturated).
    pub fn free_slots(&self) -> usize {
        let inner = self.lock();
        inner
            .settings
            .max_concurrent
            .saturating_sub(inner.count(QueueStatus::Downloading))
    }

    /// Settle a backlog task without running it.
    ///
    /// Only `pending -> error` is a real transition here; the record and
    /// `queue_status` change together under the lock, as in `finish`. Marking a
    /// task with its current status is a no-op. Any other change is refused;
    /// running tasks are owned by `claim_pending` and the worker's `finish`.
    pub fn mark(&self, id: &str, status: QueueStatus) -> Result<(), QueueError> {
        let mut inner = self.lock();
        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        let current = entry.task.queue_status;
        match (current, status) {
            (from, to) if from == to => Ok(()),
            (QueueStatus::Pending, QueueStatus::Error) => {
                entry.record = ProgressRecord::failed("marked as failed");
                entry.task.queue_status = QueueStatus::Error;
                Ok(())
            }
            (QueueStatus::Pending, QueueStatus::Completed) => Err(QueueError::InvalidInput(
                format!("task {id} has no output file to complete with"),
            )),
            _ => Err(QueueError::InvalidState {
                id: id.to_string(),
                state: current.as_str().to_string(),
            }),
        }
    }

    /// A copy of the task.
    pub fn task(&self, id: &str) -> Option<Task> {
        self.lock().entries.get(id).map(|e| e.task.clone())
    }

    /// Task and record read under one lock.
    pub fn entry(&self, id: &str) -> Option<(Task, ProgressRecord)> {
        self.lock()
            .entries
            .get(id)
            .map(|e| (e.task.clone(), e.record.clone()))
    }

    /// Remove a task and its progress record. A `downloading` task cannot be
    /// removed; it has to run to a terminal state first.
    pub fn remove(&self, id: &str) -> Result<Task, QueueError> {
        let mut inner = self.lock();
        let status = inner
            .entries
            .get(id)
            .map(|e| e.task.queue_status)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if status == QueueStatus::Downloading {
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                state: status.as_str().to_string(),
            });
        }
        let entry = inner
            .remove_entry(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        Ok(entry.task)
    }

    /// Remove every task matching `filter`. Running tasks are always kept.
    /// Returns the number removed.
    pub fn clear(&self, filter: ClearFilter) -> usize {
        let mut inner = self.lock();
        let doomed: Vec<TaskId> = inner
            .entries
            .values()
            .filter(|e| match filter {
                ClearFilter::All => e.task.queue_status != QueueStatus::Downloading,
                ClearFilter::Completed => e.task.queue_status == QueueStatus::Completed,
                ClearFilter::Failed => e.task.queue_status == QueueStatus::Error,
            })
            .map(|e| e.task.id.clone())
            .collect();
        for id in &doomed {
            inner.remove_entry(id);
        }
        doomed.len()
    }

    /// Aggregate counts by queue status.
    pub fn counts(&self) -> QueueCounts {
        let inner = self.lock();
        let mut counts = QueueCounts::default();
        for e in inner.entries.values() {
            match e.task.queue_status {
                QueueStatus::Pending => counts.pending += 1,
                QueueStatus::Downloading => counts.downloading += 1,
                QueueStatus::Completed => counts.completed += 1,
                QueueStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Ordered listing (oldest first) with counts and settings.
    pub fn snapshot(&self) -> QueueSnapshot {
        let inner = self.lock();
        let mut counts = QueueCounts::default();
        let entries = inner
            .order
            .values()
            .filter_map(|id| inner.entries.get(id))
            .map(|e| {
                match e.task.queue_status {
                    QueueStatus::Pending => counts.pending += 1,
                    QueueStatus::Downloading => counts.downloading += 1,
                    QueueStatus::Completed => counts.completed += 1,
                    QueueStatus::Error => counts.error += 1,
                }
                QueueEntry {
                    id: e.task.id.clone(),
                    url: e.task.url.clone(),
                    title: e.task.title.clone(),
                    queue_status: e.task.queue_status,
                    progress: e.record.progress,
                    speed: e.record.speed.clone(),
                    filename: e.record.filename.clone(),
                    error: e.record.error.clone(),
                    added_at: e.task.added_at,
                }
            })
            .collect();
        QueueSnapshot {
            entries,
            counts,
            settings: inner.settings.clone(),
        }
    }
}
