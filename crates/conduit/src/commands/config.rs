//! Config command - inspect and initialize configuration.
//!
//! - `conduit config show` - Effective configuration and where it came from
//! - `conduit config path` - User config file location
//! - `conduit config init` - Write a config file with every default spelled out

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::{Style, style};
use conduit_config::{ConduitConfig, save_config};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and the files it was read from
    Show,

    /// Show the user configuration file path
    Path,

    /// Initialize the user config file with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { force } => cmd_init(force, ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "configDir": loaded.config_dir,
                "loadedFrom": loaded.loaded_from(),
                "connectionsFile": loaded.connections_file(),
                "warnings": loaded.warnings,
                "config": loaded.config,
            }))?
        );
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Conduit Configuration").bold());
    println!();
    for source in &loaded.sources {
        let status = if source.loaded {
            style("✓ loaded   ").green()
        } else {
            style("· not found").dim()
        };
        println!("  {} {}", status, source.path.display());
    }
    println!(
        "  {} {}",
        dim.apply_to("Connections:"),
        loaded.connections_file().display()
    );
    println!();

    let text = loaded.config.to_toml()?;
    if text.trim().is_empty() {
        println!("{}", dim.apply_to("No settings (using defaults)"));
    } else {
        print!("{}", text);
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let path = ctx.loaded.user_config_file();
    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "path": path,
                "exists": path.is_file(),
            }))?
        );
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_init(force: bool, ctx: &Context) -> Result<()> {
    let path = ctx.loaded.user_config_file();

    if path.exists() && !force {
        if ctx.json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "status": "exists",
                    "path": path,
                }))?
            );
        } else {
            println!("Config file already exists: {}", path.display());
            println!("Use --force to overwrite it with defaults.");
        }
        return Ok(());
    }

    save_config(&ConduitConfig::with_defaults(), &path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote default config");

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "created",
                "path": path,
            }))?
        );
    } else {
        println!("{} Created {}", style("✓").green(), path.display());
    }
    Ok(())
}
