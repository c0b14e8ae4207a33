use std::path::PathBuf;

use anyhow::Result;
use calwatch_core::config::WatchConfig;
use owo_colors::OwoColorize;

pub fn run(config: Option<PathBuf>) -> Result<()> {
    let path = match config {
        Some(path) => path,
        None => WatchConfig::config_path()?,
    };

    WatchConfig::create_default_config(&path)?;

    println!("Created {}", path.display().green());
    println!("Add a [[sources]] entry, then run `calwatch run`.");
    Ok(())
}
