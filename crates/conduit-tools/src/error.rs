//! Error types for tool lookup and execution.

use thiserror::Error;

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type for tool operations.
///
/// Expected failures (missing files, bad parameters) are not errors: handlers
/// report them as [`ToolResult::error`](crate::ToolResult::error) payloads.
/// This type is reserved for lookups that miss and for handlers that cannot
/// run at all.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under the given domain and name.
    #[error("tool '{name}' not found in domain '{domain}'")]
    NotFound {
        /// Capability domain that was searched.
        domain: String,
        /// Tool name that was requested.
        name: String,
    },

    /// The handler could not run (e.g. a required sub-client failed to start).
    #[error("tool failed: {0}")]
    Failed(String),

    /// IO error raised outside a handler's own error reporting.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Create a not-found error.
    pub fn not_found(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            domain: domain.into(),
            name: name.into(),
        }
    }

    /// Create a hard-failure error.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ToolError::not_found("filesystem", "explode");
        assert!(err.to_string().contains("explode"));
        assert!(err.to_string().contains("filesystem"));

        let err = ToolError::failed("client unavailable");
        assert!(err.to_string().contains("client unavailable"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ToolError = io_err.into();
        assert!(matches!(err, ToolError::Io(_)));
    }
}
