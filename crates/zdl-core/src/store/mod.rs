//! In-memory task store: the task backlog and the live progress records.
//!
//! Both live behind one mutex so a phase change updates `queue_status` and the
//! progress record as a single step; observers never see the two disagree.
//! Nothing is persisted; lifetime is the process lifetime.

mod progress;
mod queue;
pub mod types;

pub use types::*;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::clamp_concurrency;

/// A task together with its live progress record.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) task: Task,
    pub(crate) record: ProgressRecord,
}

#[derive(Debug)]
pub(crate) struct StoreInner {
    pub(crate) entries: HashMap<TaskId, Entry>,
    /// FIFO order: `added_at` -> task id.
    pub(crate) order: BTreeMap<u64, TaskId>,
    pub(crate) next_seq: u64,
    pub(crate) settings: QueueSettings,
}

impl StoreInner {
    pub(crate) fn count(&self, status: QueueStatus) -> usize {
        self.entries
            .values()
            .filter(|e| e.task.queue_status == status)
            .count()
    }

    pub(crate) fn remove_entry(&mut self, id: &str) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        self.order.remove(&entry.task.added_at);
        Some(entry)
    }
}

/// Shared handle to all task state. Cheap to wrap in an `Arc`; every method
/// takes the lock once and releases it before returning.
#[derive(Debug)]
pub struct TaskStore {
    inner: Mutex<StoreInner>,
}

impl TaskStore {
    pub fn new(max_concurrent: usize, default_quality: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
                settings: QueueSettings {
                    max_concurrent: clamp_concurrency(max_concurrent),
                    default_quality: default_quality.into(),
                },
            }),
        }
    }

    /// A worker panicking while holding the lock must not wedge every other task.
    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current settings.
    pub fn settings(&self) -> QueueSettings {
        self.lock().settings.clone()
    }

    /// Adjust settings. The concurrency cap is clamped to 1..=5 and applies to
    /// future admissions only; running workers are never preempted.
    pub fn update_settings(
        &self,
        max_concurrent: Option<usize>,
        default_quality: Option<String>,
    ) -> QueueSettings {
        let mut inner = self.lock();
        if let Some(n) = max_concurrent {
            inner.settings.max_concurrent = clamp_concurrency(n);
        }
        if let Some(q) = default_quality.filter(|q| !q.trim().is_empty()) {
            inner.settings.default_quality = q;
        }
        inner.settings.clone()
    }
}
