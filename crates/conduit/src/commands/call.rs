//! Call command - run a tool on a connection.

use anyhow::{Context as _, Result};
use clap::Args;
use console::style;
use serde_json::Value;

use super::Context;

/// Arguments for the call command.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Connection id
    pub connection: String,

    /// Tool name
    pub tool: String,

    /// Tool parameters as a JSON object
    #[arg(long, short, default_value = "{}")]
    pub params: String,
}

/// Run the call command.
pub async fn run(args: CallArgs, ctx: &Context) -> Result<()> {
    let params: Value = serde_json::from_str(&args.params)
        .with_context(|| format!("--params is not valid JSON: {}", args.params))?;
    if !params.is_object() {
        anyhow::bail!("--params must be a JSON object");
    }

    let registry = ctx.restored_registry().await?;
    let router = ctx.tool_router(registry.clone(), ctx.tool_registry());

    let outcome = router.execute(&args.connection, &args.tool, params).await;
    registry.shutdown().await;
    let result = outcome?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(result.as_value())?);
    } else if let Some(error) = result.error_message() {
        println!("{} {}", style("✗").red(), error);
    } else {
        println!("{}", serde_json::to_string_pretty(result.as_value())?);
    }

    if result.is_error() {
        anyhow::bail!("Tool '{}' failed", args.tool);
    }
    Ok(())
}
