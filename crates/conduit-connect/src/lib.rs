//! Connection management and tool routing for conduit.
//!
//! A *connection* is an external capability source reached through one of
//! four transports (`api`, `socket-peer`, `database`, `local`). This crate
//! provides:
//!
//! - [`ConnectionRegistry`]: the live connection set, its lifecycle
//!   (add, remove, test, reconnect) and persistence through a
//!   [`ConnectionStore`]
//! - [`transport`]: the adapters that establish each connection type,
//!   including [`PeerLink`], a WebSocket link with JSON-RPC request
//!   correlation
//! - [`ToolRouter`]: runs a tool on a connection via the path its type
//!   calls for
//! - [`protocol`]: the JSON-RPC 2.0 envelopes shared with the protocol server
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use conduit_connect::{ConnectionDescriptor, ConnectionRegistry, ConnectionType,
//!     MemoryStore, ToolRouter, Transports};
//!
//! let registry = Arc::new(ConnectionRegistry::new(
//!     Arc::new(MemoryStore::new()),
//!     Transports::default(),
//! ));
//! registry
//!     .add(ConnectionDescriptor::new("Shell", ConnectionType::Local, "terminal"), true)
//!     .await?;
//! ```

pub mod error;
pub mod pending;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod store;
pub mod transport;
pub mod types;

pub use error::{ConnectError, Result, TransportError};
pub use pending::PendingTable;
pub use protocol::{
    EnvelopeError, Incoming, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId, ToolCallParams, ToolListParams, methods, parse_message,
};
pub use registry::{ConnectionRegistry, ResolvedConnection};
pub use router::{DEFAULT_CALL_TIMEOUT, ToolRouter};
pub use store::{ConnectionStore, JsonFileStore, MemoryStore};
pub use transport::{PeerLink, Transport, TransportHandle, TransportSettings, Transports};
pub use types::{
    AuthType, ConnectionDescriptor, ConnectionInfo, ConnectionPatch, ConnectionStatus,
    ConnectionType, ReconnectOutcome, RegistryStats, Secret, TestOutcome,
};
