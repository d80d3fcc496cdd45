//! CLI for the ZDL media download queue.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use zdl_core::config;

use commands::{run_check, run_config, run_discover, run_get, run_info, GetArgs};

/// Top-level CLI for the ZDL media download queue.
#[derive(Debug, Parser)]
#[command(name = "zdl")]
#[command(about = "ZDL: queued media downloads with live progress", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Show metadata for a video or playlist URL.
    Info {
        url: String,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Queue one or more URLs, download them and follow their progress.
    Get {
        /// Media page URLs.
        urls: Vec<String>,
        /// Read additional URLs from a file (one per line, `#` starts a comment).
        #[arg(long, value_name = "FILE")]
        from_file: Option<PathBuf>,
        /// Format id to request (defaults to the configured quality).
        #[arg(long, value_name = "ID")]
        format: Option<String>,
        /// Extract audio only.
        #[arg(long)]
        audio: bool,
        /// Download the whole playlist into a directory.
        #[arg(long)]
        playlist: bool,
        /// Destination directory (defaults to the configured download dir).
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,
        /// Filename hint; skips the title probe. Only valid with a single URL.
        #[arg(long)]
        title: Option<String>,
        /// Maximum concurrent downloads (1-5).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Emit progress events as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// List the entries of a playlist or channel.
    Discover {
        url: String,
        /// Stop after N entries.
        #[arg(long, value_name = "N")]
        max: Option<usize>,
        /// Emit events as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Report whether the fetcher and transcoder are installed.
    Check,

    /// Show the config file path and effective settings.
    Config,
}

impl CliCommand {
    /// Parse arguments and run the command. `Ok(false)` means the command ran
    /// but something it managed failed (exit status 1).
    pub async fn run_from_args() -> Result<bool> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Info { url, json } => run_info(cfg, &url, json).await,
            CliCommand::Get {
                urls,
                from_file,
                format,
                audio,
                playlist,
                dest,
                title,
                jobs,
                json,
            } => {
                run_get(
                    cfg,
                    GetArgs {
                        urls,
                        from_file,
                        format,
                        audio,
                        playlist,
                        dest,
                        title,
                        jobs,
                        json,
                    },
                )
                .await
            }
            CliCommand::Discover { url, max, json } => run_discover(cfg, &url, max, json).await,
            CliCommand::Check => run_check(cfg),
            CliCommand::Config => run_config(&cfg),
        }
    }
}

#[cfg(test)]
mod tests;
