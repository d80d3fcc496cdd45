use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Lower and upper bound for concurrently running downloads.
pub const MIN_CONCURRENT: usize = 1;
pub const MAX_CONCURRENT: usize = 5;

/// Clamp a requested concurrency cap into the supported range.
pub fn clamp_concurrency(n: usize) -> usize {
    n.clamp(MIN_CONCURRENT, MAX_CONCURRENT)
}

/// Global configuration loaded from `~/.config/zdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZdlConfig {
    /// Where finished media lands. Defaults to `./downloads`.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Maximum number of downloads running at once (clamped to 1..=5).
    pub max_concurrent_downloads: usize,
    /// Format id used when a request does not name one.
    pub default_quality: String,
    /// Fetcher executable (name on PATH or absolute path).
    pub fetcher_program: String,
    /// Transcoder executable checked before each download.
    pub transcoder_program: String,
    /// Optional directory holding a bundled transcoder; passed to the fetcher.
    #[serde(default)]
    pub transcoder_dir: Option<PathBuf>,
    /// Target codec for audio-only requests.
    pub audio_format: String,
    /// Timeout for the best-effort title probe that precedes a download.
    pub title_probe_timeout_secs: u64,
    /// Timeout for explicit metadata lookups (`info`, discovery).
    pub info_probe_timeout_secs: u64,
    /// Optional wall-clock limit for one download (None = no limit).
    #[serde(default)]
    pub download_timeout_secs: Option<u64>,
    /// Interval between progress snapshots pushed to subscribers.
    pub heartbeat_interval_ms: u64,
    /// Default cap on entries enumerated by a discovery session.
    pub discovery_max_items: usize,
}

impl Default for ZdlConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            max_concurrent_downloads: 2,
            default_quality: "best".to_string(),
            fetcher_program: "yt-dlp".to_string(),
            transcoder_program: "ffmpeg".to_string(),
            transcoder_dir: None,
            audio_format: "mp3".to_string(),
            title_probe_timeout_secs: 30,
            info_probe_timeout_secs: 120,
            download_timeout_secs: None,
            heartbeat_interval_ms: 500,
            discovery_max_items: 50,
        }
    }
}

impl ZdlConfig {
    /// Effective download directory.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn title_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.title_probe_timeout_secs)
    }

    pub fn info_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.info_probe_timeout_secs)
    }

    pub fn download_timeout(&self) -> Option<Duration> {
        self.download_timeout_secs.map(Duration::from_secs)
    }

    /// The config as it would be written to disk.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("zdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ZdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ZdlConfig::default();
        let toml = default_cfg.to_toml_string()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let mut cfg: ZdlConfig = toml::from_str(&data)?;
    cfg.max_concurrent_downloads = clamp_concurrency(cfg.max_concurrent_downloads);
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ZdlConfig::default();
        assert_eq!(cfg.max_concurrent_downloads, 2);
        assert_eq!(cfg.default_quality, "best");
        assert_eq!(cfg.audio_format, "mp3");
        assert!(cfg.download_timeout_secs.is_none());
        assert_eq!(cfg.download_dir(), PathBuf::from("downloads"));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ZdlConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ZdlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_concurrent_downloads, cfg.max_concurrent_downloads);
        assert_eq!(parsed.fetcher_program, cfg.fetcher_program);
        assert_eq!(parsed.heartbeat_interval_ms, cfg.heartbeat_interval_ms);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            download_dir = "/srv/media"
            max_concurrent_downloads = 4
            default_quality = "137"
            fetcher_program = "/opt/bin/yt-dlp"
            transcoder_program = "ffmpeg"
            transcoder_dir = "/opt/ffmpeg/bin"
            audio_format = "opus"
            title_probe_timeout_secs = 10
            info_probe_timeout_secs = 60
            download_timeout_secs = 3600
            heartbeat_interval_ms = 250
            discovery_max_items = 20
        "#;
        let cfg: ZdlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.download_dir(), PathBuf::from("/srv/media"));
        assert_eq!(cfg.max_concurrent_downloads, 4);
        assert_eq!(cfg.transcoder_dir, Some(PathBuf::from("/opt/ffmpeg/bin")));
        assert_eq!(cfg.download_timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(cfg.heartbeat(), Duration::from_millis(250));
    }

    #[test]
    fn concurrency_is_clamped() {
        assert_eq!(clamp_concurrency(0), 1);
        assert_eq!(clamp_concurrency(3), 3);
        assert_eq!(clamp_concurrency(99), 5);
    }
}
