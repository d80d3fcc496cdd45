//! CLI command handlers, one file per command.

mod check;
mod config;
mod discover;
mod get;
mod info;

pub use check::run_check;
pub use config::run_config;
pub use discover::run_discover;
pub use get::{run_get, GetArgs};
pub use info::run_info;
