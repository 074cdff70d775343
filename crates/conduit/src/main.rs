//! Conduit - connection manager and tool router
//!
//! Main entry point for the conduit CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{call, config, connections, serve, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Conduit - manage connections and route tool calls to them
#[derive(Parser)]
#[command(name = "conduit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config directory (default: platform config dir, or $CONDUIT_CONFIG_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Restore connections and run the embedded protocol server
    Serve(serve::ServeArgs),

    /// Manage connections
    Connections(connections::ConnectionsArgs),

    /// Inspect local tool domains
    Tools(tools::ToolsArgs),

    /// Run a tool on a connection
    Call(call::CallArgs),

    /// Inspect or initialize configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = conduit_config::load_config_with_options(None, cli.config.as_deref())?;

    // Console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "conduit=debug,conduit_connect=debug,conduit_server=debug,conduit_tools=debug,conduit_config=debug,info"
    } else {
        "conduit=info,conduit_connect=info,conduit_server=info,conduit_tools=info,warn"
    };

    let file_appender = tracing_appender::rolling::daily(loaded.log_dir(), "conduit.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "conduit=trace,conduit_connect=trace,conduit_server=trace,conduit_tools=trace,conduit_config=trace,info",
                )),
        )
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        loaded,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Connections(args) => connections::run(args, &ctx).await,
        Commands::Tools(args) => tools::run(args, &ctx).await,
        Commands::Call(args) => call::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
