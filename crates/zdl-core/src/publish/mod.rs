//! Push sequences for observers: per-task progress snapshots and per-session
//! discovery events.
//!
//! Both are polling subscriptions over the shared state with a fixed
//! heartbeat interval; neither holds a lock across the sleep.

mod discovery_stream;
mod task_stream;

pub use discovery_stream::{discovery_events, DiscoveryEvent};
pub use task_stream::{task_events, TaskEvent};
