//! `zdl config` – show where the config lives and what is in effect.

use anyhow::Result;
use zdl_core::config::{self, ZdlConfig};

pub fn run_config(cfg: &ZdlConfig) -> Result<bool> {
    println!("# {}", config::config_path()?.display());
    print!("{}", cfg.to_toml_string()?);
    println!("# effective download dir: {}", cfg.download_dir().display());
    Ok(true)
}
