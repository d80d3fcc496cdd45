pub mod config;
pub mod logging;

pub mod discovery;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod parse;
pub mod publish;
pub mod sanitize;
pub mod scheduler;
pub mod store;

pub use engine::Engine;
pub use error::{ErrorKind, FetchError, QueueError};
