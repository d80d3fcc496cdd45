//! `zdl discover <url>` – enumerate a playlist or channel.

use anyhow::Result;
use futures::StreamExt;
use zdl_core::config::ZdlConfig;
use zdl_core::publish::DiscoveryEvent;
use zdl_core::Engine;

pub async fn run_discover(
    cfg: ZdlConfig,
    url: &str,
    max: Option<usize>,
    json: bool,
) -> Result<bool> {
    let engine = Engine::new(cfg);
    let session = engine.start_discovery(url, max)?;
    tracing::debug!(session_id = %session, "discovery session started");

    let mut events = Box::pin(engine.subscribe_discovery(&session));
    let mut ok = true;
    while let Some(event) = events.next().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        }
        match event {
            DiscoveryEvent::Video { index, entry } if !json => {
                let url = entry.url.as_deref().unwrap_or(&entry.id);
                println!(
                    "{:>4}. {}  [{}]  {}",
                    index + 1,
                    entry.title.as_deref().unwrap_or(&entry.id),
                    entry.duration,
                    url
                );
            }
            DiscoveryEvent::Completed { count } if !json => {
                println!("{count} entries found");
            }
            DiscoveryEvent::Error { message } => {
                if !json {
                    eprintln!("discovery failed: {message}");
                }
                ok = false;
            }
            DiscoveryEvent::Unknown => ok = false,
            _ => {}
        }
    }
    drop(events);
    if let Err(e) = engine.remove_discovery(&session) {
        tracing::debug!(session_id = %session, error = %e, "discovery session left in place");
    }
    Ok(ok)
}
