/*
[INPUT]:  Interactive user input via CLI
[OUTPUT]: Generated YAML configuration file
[POS]:    CLI initialization layer
[UPDATE]: When TrackerConfig schema changes
*/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, theme::ColorfulTheme};

use mmr_tracker::TrackerConfig;
use mmr_tracker::config::default_data_dir;

pub fn run_init(output: &Path) -> Result<()> {
    println!("{}", style("Welcome to MMR Tracker Init").bold().cyan());
    println!(
        "{}",
        style("This will guide you through creating a tracker configuration.").dim()
    );

    let theme = ColorfulTheme::default();
    let mut config = TrackerConfig::default();

    println!("\n{}", style("--- Backend ---").bold());
    config.backend.url = Input::with_theme(&theme)
        .with_prompt("Project URL (e.g., https://xyz.supabase.co)")
        .interact_text()?;
    config.backend.api_key = Input::with_theme(&theme)
        .with_prompt("Public API key")
        .interact_text()?;

    println!("\n{}", style("--- Storage ---").bold());
    let data_dir: String = Input::with_theme(&theme)
        .with_prompt("Data directory")
        .default(default_data_dir().display().to_string())
        .interact_text()?;
    config.storage.data_dir = Some(PathBuf::from(data_dir));

    config.validate().context("configuration is incomplete")?;
    let yaml = config.to_yaml()?;
    std::fs::write(output, yaml)
        .with_context(|| format!("failed to write config to {}", output.display()))?;

    println!("\n{}", style("SUCCESS!").bold().green());
    println!(
        "Configuration written to: {}",
        style(output.display()).cyan()
    );

    Ok(())
}
