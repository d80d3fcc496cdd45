//! Progress record operations: get, set, guarded update, terminal finish.

use super::types::{ProgressRecord, ProgressStatus, QueueStatus, TaskId};
use super::TaskStore;
use crate::error::QueueError;

impl TaskStore {
    /// Snapshot of a task's progress record.
    pub fn progress(&self, id: &str) -> Option<ProgressRecord> {
        self.lock().entries.get(id).map(|e| e.record.clone())
    }

    /// Replace a task's progress record.
    ///
    /// Fails with `NotFound` for unknown ids and `InvalidState` once the
    /// current record is terminal. A terminal record is refused with
    /// `InvalidInput`: those go through `finish`, which also settles
    /// `queue_status`.
    pub fn set_progress(&self, id: &str, record: ProgressRecord) -> Result<(), QueueError> {
        if record.is_terminal() {
            return Err(QueueError::InvalidInput(format!(
                "terminal status {} for task {id} must go through finish",
                record.status.as_str()
            )));
        }
        let mut inner = self.lock();
        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if entry.record.is_terminal() {
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                state: entry.record.status.as_str().to_string(),
            });
        }
        entry.record = record;
        Ok(())
    }

    /// Apply `f` to the record of a running task. Returns false (and does not
    /// call `f`) when the task is gone or its record is already terminal.
    pub fn update_progress<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut ProgressRecord),
    {
        let mut inner = self.lock();
        match inner.entries.get_mut(id) {
            Some(entry) if !entry.record.is_terminal() => {
                f(&mut entry.record);
                true
            }
            _ => false,
        }
    }

    /// Move a task into its terminal state: the record and `queue_status`
    /// change together. A `completed` record must name its output file.
    pub fn finish(&self, id: &TaskId, record: ProgressRecord) -> Result<(), QueueError> {
        let queue_status = match record.status {
            ProgressStatus::Completed
                if record.error.is_none()
                    && record.filename.as_deref().is_some_and(|n| !n.is_empty()) =>
            {
                QueueStatus::Completed
            }
            ProgressStatus::Error => QueueStatus::Error,
            other => {
                return Err(QueueError::InvalidInput(format!(
                    "cannot finish task {id} with status {}",
                    other.as_str()
                )))
            }
        };

        let mut inner = self.lock();
        let entry = inner
            .entries
            .get_mut(id.as_str())
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        if entry.record.is_terminal() {
            return Err(QueueError::InvalidState {
                id: id.clone(),
                state: entry.record.status.as_str().to_string(),
            });
        }
        entry.record = record;
        entry.task.queue_status = queue_status;
        Ok(())
    }
}
