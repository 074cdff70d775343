//! Transport adapters: one strategy per [`ConnectionType`].
//!
//! An adapter turns a descriptor into a live [`TransportHandle`]. The registry
//! owns the handle and passes it back for teardown; it never leaves the crate
//! except as the peer link the router uses for correlated calls.

mod api;
mod database;
mod local;
mod peer;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::{ConnectionDescriptor, ConnectionType};

pub use api::ApiTransport;
pub use database::DatabaseTransport;
pub use local::LocalTransport;
pub use peer::{PeerLink, SocketPeerTransport};

/// Live transport state owned by the connection registry.
#[derive(Debug, Clone)]
pub enum TransportHandle {
    /// API endpoint answered its probe.
    Api,
    /// Open WebSocket link to a peer.
    Peer(Arc<PeerLink>),
    /// Database placeholder.
    Database,
    /// In-process capabilities.
    Local,
}

impl TransportHandle {
    /// The peer link, for socket-peer handles.
    pub fn peer(&self) -> Option<&Arc<PeerLink>> {
        match self {
            Self::Peer(link) => Some(link),
            _ => None,
        }
    }
}

/// Strategy for bringing a descriptor into the connected state.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection described by `descriptor`.
    async fn establish(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<TransportHandle, TransportError>;

    /// Release a handle returned by `establish`.
    async fn teardown(&self, handle: TransportHandle) {
        if let TransportHandle::Peer(link) = handle {
            link.close().await;
        }
    }
}

/// Timeouts applied by the built-in adapters.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Deadline for the API probe request.
    pub api_probe_timeout: Duration,
    /// Deadline for the WebSocket handshake.
    pub peer_connect_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            api_probe_timeout: Duration::from_secs(5),
            peer_connect_timeout: Duration::from_secs(5),
        }
    }
}

/// The adapter set, selected by connection type.
#[derive(Clone)]
pub struct Transports {
    api: Arc<dyn Transport>,
    socket_peer: Arc<dyn Transport>,
    database: Arc<dyn Transport>,
    local: Arc<dyn Transport>,
}

impl Transports {
    /// Built-in adapters configured by `settings`.
    pub fn new(settings: &TransportSettings) -> Self {
        Self {
            api: Arc::new(ApiTransport::new(settings.api_probe_timeout)),
            socket_peer: Arc::new(SocketPeerTransport::new(settings.peer_connect_timeout)),
            database: Arc::new(DatabaseTransport),
            local: Arc::new(LocalTransport),
        }
    }

    /// Replace the adapter used for `kind`.
    pub fn with_adapter(mut self, kind: ConnectionType, adapter: Arc<dyn Transport>) -> Self {
        match kind {
            ConnectionType::Api => self.api = adapter,
            ConnectionType::SocketPeer => self.socket_peer = adapter,
            ConnectionType::Database => self.database = adapter,
            ConnectionType::Local => self.local = adapter,
        }
        self
    }

    /// The adapter for `kind`.
    pub fn for_kind(&self, kind: ConnectionType) -> &dyn Transport {
        match kind {
            ConnectionType::Api => self.api.as_ref(),
            ConnectionType::SocketPeer => self.socket_peer.as_ref(),
            ConnectionType::Database => self.database.as_ref(),
            ConnectionType::Local => self.local.as_ref(),
        }
    }
}

impl Default for Transports {
    fn default() -> Self {
        Self::new(&TransportSettings::default())
    }
}

impl std::fmt::Debug for Transports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transports").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_and_database_always_connect() {
        let transports = Transports::default();

        let local = ConnectionDescriptor::new("fs", ConnectionType::Local, "filesystem");
        let handle = transports
            .for_kind(ConnectionType::Local)
            .establish(&local)
            .await
            .unwrap();
        assert!(matches!(handle, TransportHandle::Local));

        let db = ConnectionDescriptor::new("db", ConnectionType::Database, "postgres://nowhere");
        let handle = transports
            .for_kind(ConnectionType::Database)
            .establish(&db)
            .await
            .unwrap();
        assert!(matches!(handle, TransportHandle::Database));
        assert!(handle.peer().is_none());
    }
}
