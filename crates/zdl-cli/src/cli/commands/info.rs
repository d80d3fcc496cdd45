//! `zdl info <url>` – metadata lookup.

use anyhow::Result;
use zdl_core::config::ZdlConfig;
use zdl_core::fetcher::{InfoResult, MediaInfo};
use zdl_core::Engine;

pub async fn run_info(cfg: ZdlConfig, url: &str, json: bool) -> Result<bool> {
    let engine = Engine::new(cfg);
    let info = engine.info(url).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(true);
    }

    match info {
        InfoResult::Video(video) => print_video(&video),
        InfoResult::Playlist { title, videos } => {
            println!("{title}");
            for (i, v) in videos.iter().enumerate() {
                println!(
                    "{:>4}. {}  [{}]",
                    i + 1,
                    v.title.as_deref().unwrap_or(&v.id),
                    v.duration
                );
            }
        }
    }
    Ok(true)
}

fn print_video(video: &MediaInfo) {
    println!("Title:    {}", video.title.as_deref().unwrap_or("Unknown"));
    println!("Duration: {}", video.duration);
    if let Some(uploader) = &video.uploader {
        println!("Uploader: {uploader}");
    }
    if let Some(views) = video.view_count {
        println!("Views:    {views}");
    }
    if video.formats.is_empty() {
        return;
    }
    println!();
    println!("{:<10} {:<6} {:<10} {}", "FORMAT", "EXT", "RES", "SIZE");
    for f in &video.formats {
        let size = f
            .filesize
            .map(|b| format!("{:.1} MiB", b as f64 / 1_048_576.0))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<10} {:<6} {:<10} {}", f.format_id, f.ext, f.resolution, size);
    }
}
