//! Single-line progress parser.

use regex::Regex;
use std::sync::OnceLock;

use crate::store::{ProgressRecord, ProgressStatus};

static PERCENT_RE: OnceLock<Regex> = OnceLock::new();
static TRANSFER_RE: OnceLock<Regex> = OnceLock::new();
static ITEM_RE: OnceLock<Regex> = OnceLock::new();

fn percent_re() -> &'static Regex {
    PERCENT_RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d*)?)%").expect("PERCENT_RE is valid"))
}

fn transfer_re() -> &'static Regex {
    TRANSFER_RE.get_or_init(|| {
        Regex::new(r"of\s+~?\s*([\d.]+\w+)\s+at\s+([\d.]+\w+/s)").expect("TRANSFER_RE is valid")
    })
}

fn item_re() -> &'static Regex {
    ITEM_RE.get_or_init(|| {
        Regex::new(r"Downloading (?:item|video) (\d+) of (\d+)").expect("ITEM_RE is valid")
    })
}

const DESTINATION_MARKER: &str = "Destination:";
const MERGE_MARKER: &str = "Merging formats into";
const POSTPROCESS_MARKER: &str = "Postprocessing";

/// Mutations one diagnostic line implies for a progress record. Only fields
/// that differ from the record passed to [`parse_line`] are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: Option<u8>,
    pub downloaded: Option<String>,
    pub speed: Option<String>,
    pub status: Option<ProgressStatus>,
    /// `(current, total)` in playlist mode.
    pub item: Option<(u32, u32)>,
}

impl ProgressUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, record: &mut ProgressRecord) {
        if let Some(p) = self.percent {
            record.progress = p;
        }
        if let Some(d) = self.downloaded {
            record.downloaded = Some(d);
        }
        if let Some(s) = self.speed {
            record.speed = Some(s);
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some((current, total)) = self.item {
            record.current_item = Some(current);
            record.total_items = Some(total);
        }
    }
}

/// Parse one line against the current record. Patterns are independent: a
/// line may set several fields, an unrecognized line sets none. Malformed
/// numbers are dropped.
pub fn parse_line(line: &str, record: &ProgressRecord) -> ProgressUpdate {
    let mut update = ProgressUpdate::default();

    if let Some(caps) = percent_re().captures(line) {
        if let Ok(value) = caps[1].parse::<f64>() {
            if value.is_finite() {
                let pct = value.clamp(0.0, 100.0) as u8;
                if pct != record.progress {
                    update.percent = Some(pct);
                }
            }
        }
    }

    if let Some(caps) = transfer_re().captures(line) {
        let downloaded = caps[1].to_string();
        let speed = caps[2].to_string();
        if record.downloaded.as_deref() != Some(downloaded.as_str()) {
            update.downloaded = Some(downloaded);
        }
        if record.speed.as_deref() != Some(speed.as_str()) {
            update.speed = Some(speed);
        }
    }

    // Later stages win when a line carries more than one marker.
    let status = if line.contains(POSTPROCESS_MARKER) {
        Some(ProgressStatus::Postprocessing)
    } else if line.contains(MERGE_MARKER) {
        Some(ProgressStatus::Merging)
    } else if line.contains(DESTINATION_MARKER) {
        Some(ProgressStatus::Processing)
    } else {
        None
    };
    update.status = status.filter(|s| *s != record.status);

    if let Some(caps) = item_re().captures(line) {
        if let (Ok(current), Ok(total)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
            if record.current_item != Some(current) || record.total_items != Some(total) {
                update.item = Some((current, total));
            }
        }
    }

    update
}
