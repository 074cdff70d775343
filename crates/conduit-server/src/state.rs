//! Application state shared across handlers.

use std::sync::Arc;

use conduit_tools::ToolRegistry;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::peers::PeerTable;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Tools exposed to peers.
    pub tools: Arc<ToolRegistry>,

    /// Connected peers.
    pub peers: Arc<PeerTable>,

    /// Cancelled when the server shuts down; open sockets close on it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: ServerConfig, tools: Arc<ToolRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            tools,
            peers: Arc::new(PeerTable::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Tool registry.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Peer table.
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }
}
