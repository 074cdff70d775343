//! Tools command - inspect the local tool domains.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};

use super::{Context, truncate};

/// Tool inspection commands.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    #[command(subcommand)]
    pub command: ToolsCommand,
}

#[derive(Subcommand, Debug)]
pub enum ToolsCommand {
    /// List the tools of a domain
    List(ListArgs),

    /// List the registered domains
    Domains,
}

/// Arguments for `conduit tools list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Domain to list (filesystem, terminal, calendar)
    pub domain: String,
}

/// Run the tools command.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let tools = ctx.tool_registry();

    match args.command {
        ToolsCommand::Domains => {
            let domains = tools.domains();
            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&domains)?);
            } else {
                for domain in domains {
                    println!("{}", domain);
                }
            }
        }
        ToolsCommand::List(list_args) => {
            let listed = tools.list_for_domain(&list_args.domain);
            if ctx.json_output {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "domain": list_args.domain,
                        "tools": listed,
                    }))?
                );
                return Ok(());
            }

            if listed.is_empty() {
                println!("No tools in domain '{}'.", list_args.domain);
                return Ok(());
            }

            let dim = Style::new().dim();
            println!("{}", style(format!("Tools: {}", list_args.domain)).bold());
            println!("{}", dim.apply_to("─".repeat(40)));
            for tool in listed {
                println!(
                    "  {:<24} {}",
                    style(&tool.name).cyan(),
                    truncate(&tool.description, 60)
                );
                if ctx.verbose {
                    println!("{}", serde_json::to_string_pretty(&tool.input_schema)?);
                }
            }
        }
    }
    Ok(())
}
