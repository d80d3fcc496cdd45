//! Discovery sessions: cancellable enumeration of playlist/channel members,
//! independent of the download queue.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::error::QueueError;
use crate::fetcher::{Fetcher, MediaEntry};

pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }
}

/// Snapshot of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoverySession {
    pub id: SessionId,
    pub source_url: String,
    pub max_items: usize,
    /// Append-only, in discovery order.
    pub items: Vec<MediaEntry>,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Items appended since a given index, read together with the session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDelta {
    pub items: Vec<MediaEntry>,
    pub status: SessionStatus,
    pub error: Option<String>,
}

struct SessionSlot {
    session: DiscoverySession,
    cancel: Option<oneshot::Sender<()>>,
}

/// All discovery sessions of this process.
#[derive(Default)]
pub struct DiscoveryRegistry {
    sessions: Mutex<HashMap<SessionId, SessionSlot>>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionSlot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a session and start enumerating `url` in the background.
    pub fn start(
        self: &Arc<Self>,
        fetcher: Arc<dyn Fetcher>,
        url: &str,
        max_items: usize,
        timeout: Duration,
    ) -> Result<SessionId, QueueError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(QueueError::InvalidInput("please enter a URL".to_string()));
        }
        if max_items == 0 {
            return Err(QueueError::InvalidInput(
                "max_items must be at least 1".to_string(),
            ));
        }

        let id: SessionId = uuid::Uuid::new_v4().to_string();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.lock().insert(
            id.clone(),
            SessionSlot {
                session: DiscoverySession {
                    id: id.clone(),
                    source_url: url.to_string(),
                    max_items,
                    items: Vec::new(),
                    status: SessionStatus::Running,
                    error: None,
                },
                cancel: Some(cancel_tx),
            },
        );
        tracing::info!(session_id = %id, url, max_items, "discovery started");

        let registry = Arc::clone(self);
        let session_id = id.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            let result = tokio::select! {
                res = registry.enumerate(&session_id, fetcher, &url, max_items, timeout) => res,
                _ = cancel_rx => Err("cancelled".to_string()),
            };
            registry.close(&session_id, result);
        });
        Ok(id)
    }

    async fn enumerate(
        &self,
        id: &str,
        fetcher: Arc<dyn Fetcher>,
        url: &str,
        max_items: usize,
        timeout: Duration,
    ) -> Result<(), String> {
        let (tx, mut rx) = mpsc::channel::<MediaEntry>(32);
        // Owns the receiver so a full session closes the channel and stops the fetcher.
        let collect = async move {
            while let Some(entry) = rx.recv().await {
                if !self.append(id, entry) {
                    break;
                }
            }
        };
        let (res, ()) = tokio::join!(fetcher.probe_playlist(url, max_items, timeout, tx), collect);
        res.map(|_| ()).map_err(|e| e.to_string())
    }

    /// Append an entry unless the session is gone, no longer running, or full.
    fn append(&self, id: &str, entry: MediaEntry) -> bool {
        let mut sessions = self.lock();
        let Some(slot) = sessions.get_mut(id) else {
            return false;
        };
        let session = &mut slot.session;
        if session.status != SessionStatus::Running || session.items.len() >= session.max_items {
            return false;
        }
        session.items.push(entry);
        session.items.len() < session.max_items
    }

    fn close(&self, id: &str, result: Result<(), String>) {
        let mut sessions = self.lock();
        let Some(slot) = sessions.get_mut(id) else {
            return;
        };
        slot.cancel = None;
        let session = &mut slot.session;
        if session.status != SessionStatus::Running {
            return;
        }
        match result {
            Ok(()) => {
                session.status = SessionStatus::Completed;
                tracing::info!(session_id = %id, count = session.items.len(), "discovery completed");
            }
            Err(message) => {
                tracing::info!(session_id = %id, error = %message, "discovery failed");
                session.status = SessionStatus::Error;
                session.error = Some(message);
            }
        }
    }

    /// Abort a running session; it ends in `error` with message `cancelled`.
    pub fn cancel(&self, id: &str) -> Result<(), QueueError> {
        let mut sessions = self.lock();
        let slot = sessions
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if slot.session.status != SessionStatus::Running {
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                state: slot.session.status.as_str().to_string(),
            });
        }
        if let Some(cancel) = slot.cancel.take() {
            let _ = cancel.send(());
        }
        slot.session.status = SessionStatus::Error;
        slot.session.error = Some("cancelled".to_string());
        Ok(())
    }

    pub fn session(&self, id: &str) -> Option<DiscoverySession> {
        self.lock().get(id).map(|slot| slot.session.clone())
    }

    /// Items from index `from` onward plus the current status, in one read.
    pub fn delta(&self, id: &str, from: usize) -> Option<SessionDelta> {
        self.lock().get(id).map(|slot| SessionDelta {
            items: slot.session.items.iter().skip(from).cloned().collect(),
            status: slot.session.status,
            error: slot.session.error.clone(),
        })
    }

    /// Forget a finished session.
    pub fn remove(&self, id: &str) -> Result<DiscoverySession, QueueError> {
        let mut sessions = self.lock();
        match sessions.get(id).map(|slot| slot.session.status) {
            None => Err(QueueError::NotFound(id.to_string())),
            Some(SessionStatus::Running) => Err(QueueError::InvalidState {
                id: id.to_string(),
                state: SessionStatus::Running.as_str().to_string(),
            }),
            Some(_) => sessions
                .remove(id)
                .map(|slot| slot.session)
                .ok_or_else(|| QueueError::NotFound(id.to_string())),
        }
    }
}
