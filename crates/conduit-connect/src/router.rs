//! Tool execution router.
//!
//! Resolves a connection and runs a tool through the path its transport type
//! calls for. Handler-level failures come back as `{success: false, error}`
//! results; transport failures (timeouts, closed links, unavailable
//! connections) are returned as [`ConnectError`]s.

use std::sync::Arc;
use std::time::Duration;

use conduit_tools::{LocalDomain, ToolError, ToolRegistry, ToolResult};
use serde_json::{Value, json};

use crate::error::{ConnectError, Result, TransportError};
use crate::protocol::methods;
use crate::registry::{ConnectionRegistry, ResolvedConnection};
use crate::transport::PeerLink;
use crate::types::ConnectionType;

/// Default deadline for a correlated tool call over a peer link.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Routes tool calls to the connection that serves them.
#[derive(Debug, Clone)]
pub struct ToolRouter {
    connections: Arc<ConnectionRegistry>,
    tools: Arc<ToolRegistry>,
    call_timeout: Duration,
}

impl ToolRouter {
    /// Create a router over `connections` and `tools`.
    pub fn new(connections: Arc<ConnectionRegistry>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            connections,
            tools,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the deadline for peer tool calls.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The connection registry.
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// The tool registry.
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run `tool_name` on connection `connection_id`.
    pub async fn execute(
        &self,
        connection_id: &str,
        tool_name: &str,
        params: Value,
    ) -> Result<ToolResult> {
        let connection = self.connections.resolve(connection_id)?;
        tracing::debug!(
            connection = %connection_id,
            kind = %connection.kind,
            tool = %tool_name,
            "routing tool call"
        );

        match connection.kind {
            ConnectionType::Local => {
                let domain = LocalDomain::from_endpoint(&connection.endpoint);
                self.execute_in_process(domain.as_str(), tool_name, params)
                    .await
            }
            ConnectionType::Api => {
                self.execute_in_process(&connection.id, tool_name, params)
                    .await
            }
            ConnectionType::SocketPeer => self.execute_remote(&connection, tool_name, params).await,
            ConnectionType::Database => Err(ConnectError::unsupported(format!(
                "tool execution on database connection '{}'",
                connection_id
            ))),
        }
    }

    async fn execute_in_process(
        &self,
        domain: &str,
        tool_name: &str,
        params: Value,
    ) -> Result<ToolResult> {
        match self.tools.execute(domain, tool_name, params).await {
            Ok(result) => Ok(result),
            Err(err @ ToolError::NotFound { .. }) => Err(err.into()),
            Err(err) => {
                tracing::warn!(domain = %domain, tool = %tool_name, error = %err, "tool handler failed");
                Ok(ToolResult::error(err.to_string()))
            }
        }
    }

    async fn execute_remote(
        &self,
        connection: &ResolvedConnection,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolResult> {
        let link: &Arc<PeerLink> =
            connection
                .peer
                .as_ref()
                .ok_or_else(|| ConnectError::ConnectionUnavailable {
                    id: connection.id.clone(),
                    status: crate::types::ConnectionStatus::Disconnected,
                })?;

        let domain = LocalDomain::from_endpoint(&connection.endpoint);
        let params = json!({
            "domain": domain.as_str(),
            "toolName": tool_name,
            "arguments": arguments,
        });

        let response = link
            .request(methods::TOOLS_CALL, Some(params), self.call_timeout)
            .await
            .map_err(|e| match e {
                TransportError::Timeout(timeout) => ConnectError::ToolCallTimeout {
                    connection_id: connection.id.clone(),
                    timeout,
                },
                TransportError::Closed => ConnectError::ConnectionUnavailable {
                    id: connection.id.clone(),
                    status: crate::types::ConnectionStatus::Disconnected,
                },
                other => ConnectError::Transport(other),
            })?;

        match response.into_result() {
            Ok(value) => Ok(ToolResult::from_value(value)),
            Err(error) => {
                tracing::debug!(
                    connection = %connection.id,
                    tool = %tool_name,
                    code = error.code,
                    "peer reported tool failure"
                );
                Ok(ToolResult::error(error.message))
            }
        }
    }
}
