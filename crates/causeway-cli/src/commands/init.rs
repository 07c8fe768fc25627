//! Initialize command - writes a default causeway.toml.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use causeway_config::{CausewayConfig, ConfigFiles};

pub fn run(path: &str) -> Result<()> {
    let project_dir = Path::new(path);
    let files = ConfigFiles::for_dir(project_dir);

    if files.is_initialized() {
        anyhow::bail!(
            "Already initialized in {}. causeway.toml already exists.",
            project_dir.display()
        );
    }

    fs::create_dir_all(project_dir).context("Failed to create directory")?;

    let config_path = files.project();
    let content = CausewayConfig::default()
        .to_toml()
        .context("Failed to serialize configuration")?;
    fs::write(config_path, content).context("Failed to write causeway.toml")?;

    tracing::info!(path = %config_path.display(), "configuration written");
    println!("Wrote {}", config_path.display());
    println!();
    println!("Point [catalog] items/ratings at a dataset, then run:");
    println!("  causeway repl {path}");

    Ok(())
}
