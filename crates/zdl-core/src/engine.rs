//! Engine facade: every queue, progress, discovery and metadata operation a
//! front end needs, wired to one task store and one scheduling loop.

use futures::Stream;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::ZdlConfig;
use crate::discovery::{DiscoveryRegistry, DiscoverySession, SessionId};
use crate::error::QueueError;
use crate::fetcher::{
    classify_url, Fetcher, InfoResult, MediaEntry, SystemTranscoder, ToolStatus, Transcoder,
    UrlClass, YtDlp,
};
use crate::publish::{discovery_events, task_events, DiscoveryEvent, TaskEvent};
use crate::scheduler::{spawn_scheduler, SchedulerHandle, WorkerContext};
use crate::store::{
    ClearFilter, EnqueueReceipt, ProgressRecord, ProgressStatus, QueueSettings, QueueSnapshot,
    Task, TaskRequest, TaskStore,
};

pub struct Engine {
    config: ZdlConfig,
    store: Arc<TaskStore>,
    fetcher: Arc<dyn Fetcher>,
    transcoder: Arc<dyn Transcoder>,
    scheduler: SchedulerHandle,
    discovery: Arc<DiscoveryRegistry>,
}

impl Engine {
    /// Engine backed by the real fetcher and transcoder named in `config`.
    /// Must be called inside a Tokio runtime (the scheduling loop is spawned).
    pub fn new(config: ZdlConfig) -> Self {
        let fetcher = YtDlp::new(config.fetcher_program.clone())
            .with_transcoder_dir(config.transcoder_dir.clone());
        let transcoder = SystemTranscoder::new(
            config.transcoder_program.clone(),
            config.transcoder_dir.clone(),
        );
        Self::with_collaborators(config, Arc::new(fetcher), Arc::new(transcoder))
    }

    /// Engine with explicit collaborators.
    pub fn with_collaborators(
        config: ZdlConfig,
        fetcher: Arc<dyn Fetcher>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let store = Arc::new(TaskStore::new(
            config.max_concurrent_downloads,
            config.default_quality.clone(),
        ));
        let scheduler = spawn_scheduler(Arc::new(WorkerContext {
            store: Arc::clone(&store),
            fetcher: Arc::clone(&fetcher),
            transcoder: Arc::clone(&transcoder),
            audio_format: config.audio_format.clone(),
            title_probe_timeout: config.title_probe_timeout(),
            download_timeout: config.download_timeout(),
        }));
        Self {
            config,
            store,
            fetcher,
            transcoder,
            scheduler,
            discovery: Arc::new(DiscoveryRegistry::new()),
        }
    }

    pub fn config(&self) -> &ZdlConfig {
        &self.config
    }

    /// Add a job to the backlog and wake the scheduler.
    pub fn enqueue(&self, request: TaskRequest) -> Result<EnqueueReceipt, QueueError> {
        let receipt = self.store.enqueue(request, &self.config.download_dir())?;
        self.scheduler.kick();
        Ok(receipt)
    }

    /// Run an admission round and wait for it. Safe to call repeatedly; with
    /// an empty backlog or no free slot nothing changes. Returns the number of
    /// tasks admitted.
    pub async fn start(&self) -> usize {
        self.scheduler.kick_and_wait().await
    }

    pub fn queue(&self) -> QueueSnapshot {
        self.store.snapshot()
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.store.task(id)
    }

    pub fn progress(&self, id: &str) -> Option<ProgressRecord> {
        self.store.progress(id)
    }

    /// Remove a task that is not running.
    pub fn remove(&self, id: &str) -> Result<Task, QueueError> {
        self.store.remove(id)
    }

    pub fn clear(&self, filter: ClearFilter) -> usize {
        self.store.clear(filter)
    }

    /// Progress subscription for one task.
    pub fn subscribe(&self, id: &str) -> impl Stream<Item = TaskEvent> + Send + 'static {
        task_events(Arc::clone(&self.store), id.to_string(), self.config.heartbeat())
    }

    /// Start enumerating a playlist or channel. `max_items` defaults to the
    /// configured cap.
    pub fn start_discovery(
        &self,
        url: &str,
        max_items: Option<usize>,
    ) -> Result<SessionId, QueueError> {
        self.discovery.start(
            Arc::clone(&self.fetcher),
            url,
            max_items.unwrap_or(self.config.discovery_max_items),
            self.config.info_probe_timeout(),
        )
    }

    pub fn subscribe_discovery(
        &self,
        id: &str,
    ) -> impl Stream<Item = DiscoveryEvent> + Send + 'static {
        discovery_events(
            Arc::clone(&self.discovery),
            id.to_string(),
            self.config.heartbeat(),
        )
    }

    pub fn cancel_discovery(&self, id: &str) -> Result<(), QueueError> {
        self.discovery.cancel(id)
    }

    pub fn discovery_session(&self, id: &str) -> Option<DiscoverySession> {
        self.discovery.session(id)
    }

    /// Drop a finished discovery session and hand back its final state.
    /// Running sessions have to be cancelled first.
    pub fn remove_discovery(&self, id: &str) -> Result<DiscoverySession, QueueError> {
        self.discovery.remove(id)
    }

    pub fn settings(&self) -> QueueSettings {
        self.store.settings()
    }

    /// Adjust settings; a raised cap is used by an immediate admission round.
    pub fn update_settings(
        &self,
        max_concurrent: Option<usize>,
        default_quality: Option<String>,
    ) -> QueueSettings {
        let settings = self.store.update_settings(max_concurrent, default_quality);
        self.scheduler.kick();
        settings
    }

    /// Metadata lookup. Playlist-looking URLs are enumerated; when that fails
    /// or yields nothing the URL is probed as a single item.
    pub async fn info(&self, url: &str) -> Result<InfoResult, QueueError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(QueueError::InvalidInput("please enter a URL".to_string()));
        }
        if !self.fetcher.is_available() {
            return Err(QueueError::DependencyMissing(format!(
                "{} is not installed",
                self.fetcher.name()
            )));
        }

        let timeout = self.config.info_probe_timeout();
        let single = match classify_url(url) {
            UrlClass::Single(single) => single,
            UrlClass::Playlist(list) => {
                match self.list_entries(&list).await {
                    Ok(entries) if !entries.is_empty() => {
                        return Ok(InfoResult::Playlist {
                            title: format!("Playlist ({} videos)", entries.len()),
                            videos: entries,
                        });
                    }
                    Ok(_) => tracing::debug!(url = %list, "playlist probe found no entries"),
                    Err(e) => tracing::warn!(url = %list, error = %e, "playlist probe failed"),
                }
                list
            }
        };
        let info = self.fetcher.probe(&single, timeout).await?;
        Ok(InfoResult::Video(info))
    }

    async fn list_entries(&self, url: &str) -> Result<Vec<MediaEntry>, QueueError> {
        let (tx, mut rx) = mpsc::channel(32);
        let collect = async move {
            let mut entries = Vec::new();
            while let Some(entry) = rx.recv().await {
                entries.push(entry);
            }
            entries
        };
        let (res, entries) = tokio::join!(
            self.fetcher.probe_playlist(
                url,
                self.config.discovery_max_items,
                self.config.info_probe_timeout(),
                tx,
            ),
            collect
        );
        res?;
        Ok(entries)
    }

    /// Presence of the external tools.
    pub fn check_tools(&self) -> ToolStatus {
        ToolStatus {
            fetcher: self.fetcher.is_available(),
            transcoder: self.transcoder.is_available(),
            transcoder_path: self.transcoder.location(),
        }
    }

    /// Location of a completed task's output (a file, or a directory for
    /// playlists). `None` unless the task is completed and the output exists.
    pub async fn output_path(&self, id: &str) -> Option<PathBuf> {
        let (task, record) = self.store.entry(id)?;
        if record.status != ProgressStatus::Completed {
            return None;
        }
        let path = task.destination.join(record.filename?);
        tokio::fs::try_exists(&path)
            .await
            .unwrap_or(false)
            .then_some(path)
    }

    /// Remove a task that is not running, deleting its output if it has one.
    pub async fn cleanup(&self, id: &str) -> Result<(), QueueError> {
        let (_, record) = self
            .store
            .entry(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        let task = self.store.remove(id)?;

        let Some(filename) = record.filename else {
            return Ok(());
        };
        let path = task.destination.join(filename);
        let removed = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&path).await,
            Ok(_) => tokio::fs::remove_file(&path).await,
            Err(_) => return Ok(()),
        };
        removed.map_err(|e| {
            QueueError::ExecutionFailure(format!("cannot delete {}: {e}", path.display()))
        })?;
        tracing::info!(task_id = %id, path = %path.display(), "output removed");
        Ok(())
    }
}
