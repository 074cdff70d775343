//! Error types for connection management and tool routing.

use std::time::Duration;

use thiserror::Error;

use crate::types::ConnectionStatus;

/// Result type for registry and router operations.
pub type Result<T> = std::result::Result<T, ConnectError>;

/// Failure of a single transport operation (establish, send, correlate).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint could not be used by this transport.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending endpoint.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The probe answered with a non-success status.
    #[error("endpoint returned HTTP {0}")]
    Status(u16),

    /// WebSocket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The operation did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The underlying socket is closed.
    #[error("connection closed")]
    Closed,

    /// A correlation id was registered twice while still pending.
    #[error("request id '{0}' is already pending")]
    DuplicateRequestId(String),
}

impl TransportError {
    /// Create an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

/// Error type for registry and router operations.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// No connection with this id.
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),

    /// The connection exists but is not connected.
    #[error("connection '{id}' is not available (status: {status})")]
    ConnectionUnavailable {
        /// Connection id.
        id: String,
        /// Status at the time of the call.
        status: ConnectionStatus,
    },

    /// Establishing the connection failed.
    #[error("failed to connect '{id}': {source}")]
    ConnectionFailed {
        /// Connection id.
        id: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// A connection with this id is already registered.
    #[error("connection '{0}' already exists")]
    DuplicateConnection(String),

    /// No tool under this domain and name.
    #[error("tool '{name}' not found in domain '{domain}'")]
    ToolNotFound {
        /// Domain that was searched.
        domain: String,
        /// Requested tool.
        name: String,
    },

    /// A handler reported failure.
    #[error("tool execution failed: {0}")]
    ToolExecutionFailed(String),

    /// A correlated tool call got no response in time.
    #[error("tool call on '{connection_id}' timed out after {timeout:?}")]
    ToolCallTimeout {
        /// Connection the call was sent over.
        connection_id: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The operation is not supported for this connection.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Transport failure outside establishment.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Persistence failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ConnectError {
    /// Create a connection failed error.
    pub fn connection_failed(id: impl Into<String>, source: TransportError) -> Self {
        Self::ConnectionFailed {
            id: id.into(),
            source,
        }
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }
}

impl From<conduit_tools::ToolError> for ConnectError {
    fn from(err: conduit_tools::ToolError) -> Self {
        match err {
            conduit_tools::ToolError::NotFound { domain, name } => {
                Self::ToolNotFound { domain, name }
            }
            other => Self::ToolExecutionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectError::ConnectionUnavailable {
            id: "gh".to_string(),
            status: ConnectionStatus::Error,
        };
        assert!(err.to_string().contains("gh"));
        assert!(err.to_string().contains("error"));

        let err = ConnectError::connection_failed("api", TransportError::Status(503));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_tool_error_conversion() {
        let err: ConnectError = conduit_tools::ToolError::not_found("terminal", "x").into();
        assert!(matches!(err, ConnectError::ToolNotFound { .. }));

        let err: ConnectError = conduit_tools::ToolError::failed("no client").into();
        assert!(matches!(err, ConnectError::ToolExecutionFailed(_)));
    }

    #[test]
    fn test_connection_failed_source() {
        use std::error::Error;
        let err = ConnectError::connection_failed("x", TransportError::Closed);
        assert!(err.source().is_some());
    }
}
