use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::json;
use tokio::fs;
use tracing::info;

use super::context::CliContext;
use super::output::print_json;
use crate::cli::runtime::read_config;
use crate::config::Config;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration, environment overrides included
    Show,

    /// Print the configuration, preferences and history file locations
    Path,

    /// Write the default configuration to the configuration file
    Reset,

    /// Parse the configuration file and report problems
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path().to_path_buf();
    match args.action {
        ConfigAction::Show => {
            if ctx.output().is_json() {
                return print_json(ctx.config());
            }
            println!("# {}", path.display());
            print!("{}", serde_yaml::to_string(ctx.config())?);
        }
        ConfigAction::Path => {
            let config = ctx.config();
            if ctx.output().is_json() {
                return print_json(&json!({
                    "config": path,
                    "exists": path.exists(),
                    "preferences": config.preferences_file(),
                    "history": config.history_file(),
                }));
            }
            let state = if path.exists() { "" } else { " (not created yet)" };
            println!("config:      {}{state}", path.display());
            println!("preferences: {}", config.preferences_file().display());
            println!("history:     {}", config.history_file().display());
        }
        ConfigAction::Reset => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
            }
            let serialized = serde_yaml::to_string(&Config::default())?;
            fs::write(&path, serialized)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Reset configuration at {}", path.display());
            println!("Configuration reset to defaults and written to {}", path.display());
        }
        ConfigAction::Validate => {
            if path.exists() {
                let config = read_config(&path).await?;
                for site in &config.sites {
                    site.validate()
                        .with_context(|| format!("site {} in {}", site.id, path.display()))?;
                }
                println!("Configuration file {} is valid", path.display());
            } else {
                println!("No configuration file at {}; defaults are valid", path.display());
            }
        }
    }
    Ok(())
}
