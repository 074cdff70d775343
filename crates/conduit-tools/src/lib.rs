//! Tool framework for conduit.
//!
//! Tools are grouped into capability domains ("filesystem", "terminal",
//! "github", ...) and looked up by `(domain, name)`:
//!
//! ```text
//! ToolRegistry
//!   ├── "filesystem" ─┬─ list_directory
//!   │                 ├─ read_file
//!   │                 └─ ...
//!   └── "terminal" ───── execute_command
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use conduit_tools::{ToolRegistry, builtin};
//!
//! let mut registry = ToolRegistry::new();
//! builtin::register_all(&mut registry, &builtin::BuiltinConfig::default());
//!
//! let result = registry
//!     .execute("terminal", "execute_command", json!({"command": "echo hi"}))
//!     .await?;
//! assert!(result.is_success());
//! ```

pub mod builtin;
pub mod error;
pub mod registry;
pub mod tool;

pub use builtin::LocalDomain;
pub use error::{Result, ToolError};
pub use registry::ToolRegistry;
pub use tool::{ParamExt, ParamResult, ParameterValidationError, Tool, ToolInfo, ToolResult};
