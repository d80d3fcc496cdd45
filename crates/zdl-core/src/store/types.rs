//! Types held by the task store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Task identifier (UUID v4 string).
pub type TaskId = String;

/// Backlog membership state. Owned by the scheduler/worker pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Downloading,
    Completed,
    Error,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Downloading => "downloading",
            QueueStatus::Completed => "completed",
            QueueStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Error)
    }
}

/// Fine-grained execution state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Downloading,
    Processing,
    Merging,
    Postprocessing,
    Completed,
    Error,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::Pending => "pending",
            ProgressStatus::Downloading => "downloading",
            ProgressStatus::Processing => "processing",
            ProgressStatus::Merging => "merging",
            ProgressStatus::Postprocessing => "postprocessing",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProgressStatus::Completed | ProgressStatus::Error)
    }
}

/// Single item or whole playlist/channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Single,
    Playlist,
}

/// Live execution state of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub status: ProgressStatus,
    /// 0..=100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    /// Playlist mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_item: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u32>,
    /// Set only on `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Set only on `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressRecord {
    pub fn pending() -> Self {
        Self::with_status(ProgressStatus::Pending)
    }

    pub fn downloading() -> Self {
        Self::with_status(ProgressStatus::Downloading)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::with_status(ProgressStatus::Error)
        }
    }

    pub fn completed(filename: impl Into<String>) -> Self {
        Self {
            progress: 100,
            filename: Some(filename.into()),
            ..Self::with_status(ProgressStatus::Completed)
        }
    }

    fn with_status(status: ProgressStatus) -> Self {
        Self {
            status,
            progress: 0,
            downloaded: None,
            speed: None,
            current_item: None,
            total_items: None,
            filename: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Client request to enqueue a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    pub url: String,
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub audio_only: bool,
    #[serde(default)]
    pub destination: Option<PathBuf>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub kind: TaskKind,
}

impl TaskRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// One unit of work. Inputs are immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub url: String,
    pub format_id: String,
    pub audio_only: bool,
    pub destination: PathBuf,
    pub title: Option<String>,
    pub kind: TaskKind,
    pub queue_status: QueueStatus,
    /// Monotonic admission sequence (FIFO key).
    pub added_at: u64,
}

/// Returned by `enqueue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnqueueReceipt {
    pub task_id: TaskId,
    /// 1-based position among pending tasks.
    pub queue_position: usize,
}

/// Row of the queue listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub id: TaskId,
    pub url: String,
    pub title: Option<String>,
    pub queue_status: QueueStatus,
    pub progress: u8,
    pub speed: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
    pub added_at: u64,
}

/// Aggregate counts by queue status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub downloading: usize,
    pub completed: usize,
    pub error: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.pending + self.downloading + self.completed + self.error
    }
}

/// Runtime-adjustable queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Concurrency cap (1..=5).
    pub max_concurrent: usize,
    pub default_quality: String,
}

/// Full queue listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub entries: Vec<QueueEntry>,
    pub counts: QueueCounts,
    pub settings: QueueSettings,
}

/// Filter for `clear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearFilter {
    All,
    Completed,
    Failed,
}
