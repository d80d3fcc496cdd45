//! Metadata records decoded from the fetcher's JSON dump.

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Container extensions offered as selectable formats.
const LISTED_EXTS: &[&str] = &["mp4", "webm", "m4a"];
/// Maximum number of formats kept after deduplication.
const MAX_FORMATS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaFormat {
    pub format_id: String,
    pub ext: String,
    /// `"1080p"`, the fetcher's own label, or `"audio"`.
    pub resolution: String,
    pub height: u32,
    pub filesize: Option<u64>,
    pub vcodec: String,
    pub acodec: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub id: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: String,
    pub uploader: Option<String>,
    pub view_count: Option<u64>,
    pub formats: Vec<MediaFormat>,
}

/// One member of a playlist or channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaEntry {
    pub id: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: String,
    pub url: Option<String>,
}

/// Result of an explicit metadata lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InfoResult {
    Video(MediaInfo),
    Playlist {
        title: String,
        videos: Vec<MediaEntry>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawFormat {
    #[serde(default)]
    format_id: Option<String>,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    filesize_approx: Option<u64>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    view_count: Option<u64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

/// Render a duration as `"1h 2m 3s"` / `"2m 3s"`, or `"Unknown"`.
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(secs) = seconds.filter(|s| s.is_finite() && *s >= 0.0) else {
        return "Unknown".to_string();
    };
    let total = secs as u64;
    let (hours, rem) = (total / 3600, total % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else {
        format!("{minutes}m {seconds}s")
    }
}

/// Parse the dump for one item. Accepts either a single JSON document or
/// line-delimited output whose first decodable line is used.
pub fn parse_info_json(text: &str) -> Result<MediaInfo, FetchError> {
    let text = text.trim();
    let raw: RawInfo = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(_) => text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .find_map(|l| serde_json::from_str(l).ok())
            .ok_or_else(|| FetchError::Parse("failed to parse video info".to_string()))?,
    };

    Ok(MediaInfo {
        id: raw.id.unwrap_or_default(),
        title: raw.title,
        thumbnail: raw.thumbnail,
        duration: format_duration(raw.duration),
        uploader: raw.uploader,
        view_count: raw.view_count,
        formats: summarize_formats(raw.formats),
    })
}

/// Parse one line of a playlist dump. Undecodable lines yield `None`.
pub fn parse_entry_line(line: &str) -> Option<MediaEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let raw: RawInfo = serde_json::from_str(line).ok()?;
    Some(MediaEntry {
        id: raw.id.unwrap_or_default(),
        title: raw.title,
        thumbnail: raw.thumbnail,
        duration: format_duration(raw.duration),
        url: raw.webpage_url.or(raw.url),
    })
}

/// Keep listed containers, label resolutions, sort tallest first, drop
/// duplicate resolutions and cap the list.
fn summarize_formats(raw: Vec<RawFormat>) -> Vec<MediaFormat> {
    let mut formats: Vec<MediaFormat> = raw
        .into_iter()
        .filter(|f| f.ext.as_deref().is_some_and(|e| LISTED_EXTS.contains(&e)))
        .map(|f| {
            let height = f.height.unwrap_or(0);
            let resolution = f
                .resolution
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| {
                    if height > 0 {
                        format!("{height}p")
                    } else {
                        "audio".to_string()
                    }
                });
            MediaFormat {
                format_id: f.format_id.unwrap_or_default(),
                ext: f.ext.unwrap_or_default(),
                resolution,
                height,
                filesize: f.filesize.or(f.filesize_approx),
                vcodec: f.vcodec.unwrap_or_else(|| "none".to_string()),
                acodec: f.acodec.unwrap_or_else(|| "none".to_string()),
            }
        })
        .collect();

    formats.sort_by(|a, b| b.height.cmp(&a.height));

    let mut seen = std::collections::HashSet::new();
    formats.retain(|f| seen.insert(f.resolution.clone()));
    formats.truncate(MAX_FORMATS);
    formats
}

/// How a URL should be probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlClass {
    /// Probe as one item (URL possibly normalised).
    Single(String),
    Playlist(String),
}

/// A watch URL that also names a list is treated as the single item;
/// anything mentioning a playlist/list is probed as a playlist.
pub fn classify_url(url: &str) -> UrlClass {
    let url = url.trim();
    if url.contains("watch?v=") {
        if let Ok(parsed) = url::Url::parse(url) {
            let mut video = None;
            let mut list = None;
            for (k, v) in parsed.query_pairs() {
                match k.as_ref() {
                    "v" => video = Some(v.into_owned()),
                    "list" => list = Some(v.into_owned()),
                    _ => {}
                }
            }
            if let (Some(v), Some(_)) = (video, list) {
                let host = parsed.host_str().unwrap_or("www.youtube.com");
                return UrlClass::Single(format!("{}://{host}/watch?v={v}", parsed.scheme()));
            }
        }
    }

    let lower = url.to_ascii_lowercase();
    if lower.contains("playlist") || lower.contains("list=") {
        UrlClass::Playlist(url.to_string())
    } else {
        UrlClass::Single(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(None), "Unknown");
        assert_eq!(format_duration(Some(59.9)), "0m 59s");
        assert_eq!(format_duration(Some(3723.0)), "1h 2m 3s");
    }

    #[test]
    fn parses_single_document_and_filters_formats() {
        let json = r#"{
            "id": "abc", "title": "Clip", "duration": 125, "uploader": "me",
            "formats": [
                {"format_id": "140", "ext": "m4a", "acodec": "mp4a"},
                {"format_id": "137", "ext": "mp4", "height": 1080, "filesize_approx": 900},
                {"format_id": "248", "ext": "webm", "height": 1080},
                {"format_id": "22", "ext": "mp4", "height": 720, "filesize": 500},
                {"format_id": "sb0", "ext": "mhtml", "height": 90}
            ]
        }"#;
        let info = parse_info_json(json).unwrap();
        assert_eq!(info.id, "abc");
        assert_eq!(info.duration, "2m 5s");
        let ids: Vec<_> = info.formats.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["137", "22", "140"]);
        assert_eq!(info.formats[0].resolution, "1080p");
        assert_eq!(info.formats[0].filesize, Some(900));
        assert_eq!(info.formats[2].resolution, "audio");
        assert_eq!(info.formats[2].vcodec, "none");
    }

    #[test]
    fn falls_back_to_first_decodable_line() {
        let text = "warning: something\n{\"id\": \"x\", \"title\": \"T\"}\n";
        let info = parse_info_json(text).unwrap();
        assert_eq!(info.title.as_deref(), Some("T"));
        assert!(parse_info_json("not json at all").is_err());
    }

    #[test]
    fn entry_lines() {
        let e = parse_entry_line(r#"{"id":"v1","title":"One","duration":61,"url":"https://x/v1"}"#)
            .unwrap();
        assert_eq!(e.id, "v1");
        assert_eq!(e.duration, "1m 1s");
        assert_eq!(e.url.as_deref(), Some("https://x/v1"));
        assert!(parse_entry_line("garbage").is_none());
        assert!(parse_entry_line("   ").is_none());
    }

    #[test]
    fn classify_watch_with_list_is_single() {
        assert_eq!(
            classify_url("https://www.youtube.com/watch?v=abc&list=PL1"),
            UrlClass::Single("https://www.youtube.com/watch?v=abc".to_string())
        );
    }

    #[test]
    fn classify_playlist_and_plain() {
        assert!(matches!(
            classify_url("https://www.youtube.com/playlist?list=PL1"),
            UrlClass::Playlist(_)
        ));
        assert_eq!(
            classify_url("https://www.youtube.com/watch?v=abc"),
            UrlClass::Single("https://www.youtube.com/watch?v=abc".to_string())
        );
    }
}
