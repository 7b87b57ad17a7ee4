//! Init and Config commands.

use anyhow::{Context, Result};

use crate::config::Settings;

/// Run init command - create `.indexq/settings.toml` in the current directory.
pub fn run_init(force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Cannot determine current directory")?;
    let path = Settings::init_config_file(&cwd, force).map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("Created configuration file at: {}", path.display());
    println!("Edit this file to customize your settings.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(settings: &Settings) -> Result<()> {
    if let Err(reason) = Settings::check_init() {
        eprintln!("Note: {reason}. Showing defaults; run 'indexq init' to create one.");
    }

    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    let toml_str = toml::to_string_pretty(settings).context("Failed to render configuration")?;
    println!("{toml_str}");
    Ok(())
}
