use async_stream::stream;
use futures::Stream;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::discovery::{DiscoveryRegistry, SessionId, SessionStatus};
use crate::fetcher::MediaEntry;

/// One push to a discovery subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum DiscoveryEvent {
    /// A newly discovered entry; `index` is 0-based and never repeats.
    Video { index: usize, entry: MediaEntry },
    Completed { count: usize },
    Error { message: String },
    /// No such session.
    Unknown,
}

/// Subscribe to a discovery session. Every entry is sent exactly once, in
/// discovery order, followed by one `Completed` or `Error` event.
pub fn discovery_events(
    registry: Arc<DiscoveryRegistry>,
    session_id: SessionId,
    poll: Duration,
) -> impl Stream<Item = DiscoveryEvent> + Send + 'static {
    stream! {
        let mut ticker = tokio::time::interval(poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sent = 0usize;

        loop {
            ticker.tick().await;
            let delta = match registry.delta(&session_id, sent) {
                Some(delta) => delta,
                None => {
                    yield DiscoveryEvent::Unknown;
                    break;
                }
            };
            for entry in delta.items {
                yield DiscoveryEvent::Video { index: sent, entry };
                sent += 1;
            }
            match delta.status {
                SessionStatus::Running => {}
                SessionStatus::Completed => {
                    yield DiscoveryEvent::Completed { count: sent };
                    break;
                }
                SessionStatus::Error => {
                    yield DiscoveryEvent::Error {
                        message: delta.error.unwrap_or_else(|| "discovery failed".to_string()),
                    };
                    break;
                }
            }
        }
    }
}
