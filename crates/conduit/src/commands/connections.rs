//! Connection management commands.
//!
//! - `conduit connections list` - List connections and their status
//! - `conduit connections add` - Establish and save a new connection
//! - `conduit connections remove` - Forget a connection
//! - `conduit connections test` - Re-establish one connection
//! - `conduit connections reconnect` - Re-establish every connection
//! - `conduit connections stats` - Counts by status, type and category

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use conduit_connect::{AuthType, ConnectionDescriptor, ConnectionStatus, ConnectionType};

use super::{Context, truncate};

/// Connection management commands.
#[derive(Args, Debug)]
pub struct ConnectionsArgs {
    #[command(subcommand)]
    pub command: ConnectionsCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConnectionsCommand {
    /// List connections and their status
    List,

    /// Establish and save a new connection
    Add(AddArgs),

    /// Remove a connection
    Remove(IdArgs),

    /// Re-establish a single connection
    Test(IdArgs),

    /// Re-establish every connection
    Reconnect,

    /// Show connection statistics
    Stats,
}

/// Arguments for `conduit connections add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Display name
    pub name: String,

    /// Connection type: api, socket-peer, database or local
    #[arg(value_name = "TYPE")]
    pub kind: ConnectionType,

    /// Endpoint URL, or the local domain name for `local`
    pub endpoint: String,

    /// Explicit id (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Free-form description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Grouping category
    #[arg(long, default_value = "")]
    pub category: String,

    /// Advertised capability (repeatable)
    #[arg(long = "capability", short = 'c')]
    pub capabilities: Vec<String>,

    /// API key, sent as X-API-Key
    #[arg(long, env = "CONDUIT_API_KEY", conflicts_with = "token")]
    pub api_key: Option<String>,

    /// Bearer token
    #[arg(long, env = "CONDUIT_TOKEN")]
    pub token: Option<String>,
}

/// A single connection id.
#[derive(Args, Debug)]
pub struct IdArgs {
    /// Connection id
    pub id: String,
}

/// Run the connections command.
pub async fn run(args: ConnectionsArgs, ctx: &Context) -> Result<()> {
    let registry = ctx.restored_registry().await?;

    let result = match args.command {
        ConnectionsCommand::List => run_list(&registry, ctx),
        ConnectionsCommand::Add(add_args) => run_add(add_args, &registry, ctx).await,
        ConnectionsCommand::Remove(id_args) => run_remove(id_args, &registry, ctx).await,
        ConnectionsCommand::Test(id_args) => run_test(id_args, &registry, ctx).await,
        ConnectionsCommand::Reconnect => run_reconnect(&registry, ctx).await,
        ConnectionsCommand::Stats => run_stats(&registry, ctx),
    };

    registry.shutdown().await;
    result
}

fn status_style(status: ConnectionStatus) -> Style {
    match status {
        ConnectionStatus::Connected => Style::new().green(),
        ConnectionStatus::Error => Style::new().red(),
        ConnectionStatus::Disconnected => Style::new().dim(),
    }
}

fn run_list(registry: &conduit_connect::ConnectionRegistry, ctx: &Context) -> Result<()> {
    let connections = registry.list();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&connections)?);
        return Ok(());
    }

    if connections.is_empty() {
        println!("No connections configured.");
        println!();
        println!("Add one with:");
        println!("  conduit connections add <name> local terminal");
        println!("  conduit connections add <name> socket-peer ws://host:port");
        return Ok(());
    }

    println!(
        "{:<24} {:<20} {:<12} {:<13} {:<30}",
        "ID", "NAME", "TYPE", "STATUS", "ENDPOINT"
    );
    println!("{}", "-".repeat(100));

    for conn in &connections {
        let status = status_style(conn.status).apply_to(format!("{:<13}", conn.status));
        println!(
            "{:<24} {:<20} {:<12} {} {:<30}",
            truncate(&conn.id, 24),
            truncate(&conn.name, 20),
            conn.kind,
            status,
            truncate(&conn.endpoint, 30)
        );

        if ctx.verbose {
            if !conn.description.is_empty() {
                println!("  Description: {}", conn.description);
            }
            if !conn.category.is_empty() {
                println!("  Category: {}", conn.category);
            }
            if !conn.capabilities.is_empty() {
                println!("  Capabilities: {}", conn.capabilities.join(", "));
            }
            if let Some(at) = conn.last_connected_at {
                println!("  Last connected: {}", at.to_rfc3339());
            }
        }
        if let Some(error) = &conn.last_error {
            println!("  {} {}", style("Error:").red(), error);
        }
    }

    Ok(())
}

async fn run_add(
    args: AddArgs,
    registry: &conduit_connect::ConnectionRegistry,
    ctx: &Context,
) -> Result<()> {
    let mut descriptor = ConnectionDescriptor::new(&args.name, args.kind, &args.endpoint)
        .with_description(args.description)
        .with_category(args.category);
    if let Some(id) = args.id {
        descriptor = descriptor.with_id(id);
    }
    for capability in args.capabilities {
        descriptor = descriptor.with_capability(capability);
    }
    if let Some(key) = args.api_key {
        descriptor = descriptor.with_api_key(key);
    } else if let Some(token) = args.token {
        descriptor = descriptor.with_bearer_token(token);
    }

    if ctx.verbose {
        println!("Adding connection: {}", args.name);
        println!("  Type: {}", args.kind);
        println!("  Endpoint: {}", args.endpoint);
        if let Some(auth) = descriptor.auth_type {
            let auth = match auth {
                AuthType::Bearer => "bearer",
                AuthType::ApiKey => "api-key",
                AuthType::OAuth => "oauth",
            };
            println!("  Auth: {}", auth);
        }
    }

    let info = registry.add(descriptor, true).await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!(
            "{} Added connection '{}' ({})",
            style("✓").green(),
            info.name,
            style(&info.id).cyan()
        );
    }
    Ok(())
}

async fn run_remove(
    args: IdArgs,
    registry: &conduit_connect::ConnectionRegistry,
    ctx: &Context,
) -> Result<()> {
    if !registry.remove(&args.id).await {
        anyhow::bail!("Connection '{}' not found", args.id);
    }

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "removed",
                "id": args.id,
            }))?
        );
    } else {
        println!("{} Removed connection '{}'", style("✓").green(), args.id);
    }
    Ok(())
}

async fn run_test(
    args: IdArgs,
    registry: &conduit_connect::ConnectionRegistry,
    ctx: &Context,
) -> Result<()> {
    let outcome = registry.test(&args.id).await;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.success {
        println!("{} {}", style("✓").green(), outcome.message);
    } else {
        println!("{} {}", style("✗").red(), outcome.message);
    }

    if !outcome.success {
        anyhow::bail!("Connection test failed for '{}'", args.id);
    }
    Ok(())
}

async fn run_reconnect(registry: &conduit_connect::ConnectionRegistry, ctx: &Context) -> Result<()> {
    let outcomes = registry.reconnect_all().await;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        return Ok(());
    }

    if outcomes.is_empty() {
        println!("No connections configured.");
        return Ok(());
    }
    for outcome in &outcomes {
        match &outcome.error {
            None => println!("{} {}", style("✓").green(), outcome.id),
            Some(error) => println!("{} {}: {}", style("✗").red(), outcome.id, error),
        }
    }
    let ok = outcomes.iter().filter(|o| o.success).count();
    println!();
    println!("{}/{} connections established", ok, outcomes.len());
    Ok(())
}

fn run_stats(registry: &conduit_connect::ConnectionRegistry, ctx: &Context) -> Result<()> {
    let stats = registry.stats();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Connection Statistics").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  Total:  {}", style(stats.total).cyan());
    println!(
        "  Server: {}",
        if stats.server_running { "running" } else { "stopped" }
    );

    if !stats.by_status.is_empty() {
        println!();
        println!("  {}", dim.apply_to("By status"));
        for (status, count) in &stats.by_status {
            println!("    {:<14} {}", status_style(*status).apply_to(status), count);
        }
    }
    if !stats.by_type.is_empty() {
        println!();
        println!("  {}", dim.apply_to("By type"));
        for (kind, count) in &stats.by_type {
            println!("    {:<14} {}", kind, count);
        }
    }
    if !stats.by_category.is_empty() {
        println!();
        println!("  {}", dim.apply_to("By category"));
        for (category, count) in &stats.by_category {
            println!("    {:<14} {}", category, count);
        }
    }
    Ok(())
}
