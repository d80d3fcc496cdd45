//! `zdl check` – dependency report.

use anyhow::Result;
use zdl_core::config::ZdlConfig;
use zdl_core::Engine;

pub fn run_check(cfg: ZdlConfig) -> Result<bool> {
    let fetcher = cfg.fetcher_program.clone();
    let transcoder = cfg.transcoder_program.clone();
    let status = Engine::new(cfg).check_tools();

    println!("{:<12} {}", fetcher, if status.fetcher { "ok" } else { "missing" });
    match &status.transcoder_path {
        Some(path) => println!("{:<12} ok ({})", transcoder, path.display()),
        None => println!("{:<12} missing", transcoder),
    }
    if status.ready() {
        println!("All tools ready");
    } else {
        println!("Some tools are missing");
    }
    Ok(status.ready())
}
