//! Drop guard that fails a task whose worker never reached a terminal state.

use std::sync::Arc;

use crate::store::{ProgressRecord, TaskId, TaskStore};

/// Held by a worker for its whole run. If the worker panics or its future is
/// dropped before `disarm`, the task is moved to `error` so its slot is freed.
pub(super) struct WorkerGuard {
    store: Arc<TaskStore>,
    task_id: TaskId,
    armed: bool,
}

impl WorkerGuard {
    pub(super) fn new(store: Arc<TaskStore>, task_id: TaskId) -> Self {
        Self {
            store,
            task_id,
            armed: true,
        }
    }

    pub(super) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self
            .store
            .finish(&self.task_id, ProgressRecord::failed("worker aborted"))
            .is_ok()
        {
            tracing::warn!(task_id = %self.task_id, "worker ended without a terminal state");
        }
    }
}
