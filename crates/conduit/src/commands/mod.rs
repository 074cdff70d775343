//! CLI command handlers.

pub mod call;
pub mod config;
pub mod connections;
pub mod serve;
pub mod tools;

use std::sync::Arc;

use conduit_config::LoadedConfig;
use conduit_connect::{
    ConnectionRegistry, ConnectionStore, JsonFileStore, ToolRouter, TransportSettings, Transports,
};
use conduit_tools::ToolRegistry;
use conduit_tools::builtin::{BuiltinConfig, TerminalConfig, register_all};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Discovered configuration.
    pub loaded: LoadedConfig,
}

impl Context {
    /// Local tool registry with every built-in domain.
    pub fn tool_registry(&self) -> Arc<ToolRegistry> {
        let terminal = self.loaded.config.terminal();
        let mut terminal_config = TerminalConfig::new().with_timeout(terminal.command_timeout());
        if let Some(dir) = terminal.working_dir {
            terminal_config = terminal_config.with_working_dir(dir);
        }

        let mut tools = ToolRegistry::new();
        register_all(
            &mut tools,
            &BuiltinConfig {
                terminal: terminal_config,
                ..Default::default()
            },
        );
        Arc::new(tools)
    }

    /// Connection store at the configured path.
    pub fn store(&self) -> Arc<dyn ConnectionStore> {
        Arc::new(JsonFileStore::new(self.loaded.connections_file()))
    }

    /// Registry over `store` with transports tuned by `[timeouts]`.
    pub fn connection_registry(&self, store: Arc<dyn ConnectionStore>) -> ConnectionRegistry {
        let timeouts = self.loaded.config.timeouts();
        let transports = Transports::new(&TransportSettings {
            api_probe_timeout: timeouts.api_probe(),
            peer_connect_timeout: timeouts.peer_connect(),
        });
        ConnectionRegistry::new(store, transports)
    }

    /// Registry restored from the configured store.
    ///
    /// Connections that fail to establish stay registered in `error` status.
    pub async fn restored_registry(&self) -> anyhow::Result<Arc<ConnectionRegistry>> {
        let registry = Arc::new(self.connection_registry(self.store()));
        let outcomes = registry.restore().await?;
        for outcome in outcomes.iter().filter(|o| !o.success) {
            tracing::debug!(
                connection = %outcome.id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "connection unavailable"
            );
        }
        Ok(registry)
    }

    /// Tool router with the configured call deadline.
    pub fn tool_router(
        &self,
        registry: Arc<ConnectionRegistry>,
        tools: Arc<ToolRegistry>,
    ) -> ToolRouter {
        ToolRouter::new(registry, tools).with_call_timeout(self.loaded.config.timeouts().tool_call())
    }
}

/// Truncate a string for table display.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
