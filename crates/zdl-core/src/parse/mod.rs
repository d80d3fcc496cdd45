//! Fetcher diagnostic parsing.
//!
//! `lines` cuts a raw byte stream into lines (carriage returns count as line
//! ends, so in-place progress redraws are seen); `progress_line` turns one line
//! into a set of progress record mutations.

mod lines;
mod progress_line;

pub use lines::{split_all, LineSplitter};
pub use progress_line::{parse_line, ProgressUpdate};
