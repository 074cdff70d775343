//! Serve command - restore connections and run the embedded server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use conduit_connect::{ConnectionStore, MemoryStore};
use conduit_server::{ProtocolServer, ServerConfig};

use super::Context;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the protocol server to (overrides config)
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Keep connections in memory only; nothing is read or written
    #[arg(long)]
    pub ephemeral: bool,

    /// Do not start the embedded protocol server
    #[arg(long)]
    pub no_server: bool,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let section = ctx.loaded.config.server();
    let bind_address = match args.bind {
        Some(addr) => addr,
        None => section.bind_addr()?,
    };

    let store: Arc<dyn ConnectionStore> = if args.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        ctx.store()
    };

    let running = Arc::new(AtomicBool::new(false));
    let registry = Arc::new(
        ctx.connection_registry(store)
            .with_server_flag(running.clone()),
    );
    let tools = ctx.tool_registry();

    let outcomes = registry
        .restore()
        .await
        .context("failed to restore connections")?;
    let restored = outcomes.iter().filter(|o| o.success).count();
    for outcome in outcomes.iter().filter(|o| !o.success) {
        tracing::warn!(
            connection = %outcome.id,
            error = outcome.error.as_deref().unwrap_or("unknown"),
            "connection failed to restore"
        );
    }
    tracing::info!(restored, total = outcomes.len(), "connections restored");

    let handle = if section.enabled && !args.no_server {
        let config = ServerConfig::new()
            .with_bind_address(bind_address)
            .with_name(section.name.clone())
            .with_max_message_size(section.max_message_size);
        let handle = ProtocolServer::new(config, tools.clone())
            .with_running_flag(running)
            .start()
            .await?;
        Some(handle)
    } else {
        None
    };

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "serving",
                "connections": outcomes.len(),
                "restored": restored,
                "server": handle.as_ref().map(|h| h.url()),
            }))?
        );
    } else {
        let dim = Style::new().dim();
        println!("{}", style("Conduit").bold());
        println!(
            "  {} {}/{}",
            dim.apply_to("Connections:"),
            style(restored).cyan(),
            outcomes.len()
        );
        match &handle {
            Some(h) => println!("  {} {}", dim.apply_to("Server:     "), style(h.url()).green()),
            None => println!("  {} disabled", dim.apply_to("Server:     ")),
        }
        if ctx.verbose {
            println!("  {} {}", dim.apply_to("Tools:      "), tools.len());
        }
        println!();
        println!("{}", dim.apply_to("Press Ctrl-C to stop."));
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");

    if let Some(handle) = handle {
        handle.shutdown().await?;
    }
    registry.shutdown().await;
    Ok(())
}
