//! Table of connected peers.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique identifier for a connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PeerId(Uuid);

impl PeerId {
    /// Create a new unique peer id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PeerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Public view of a peer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    /// Peer id.
    pub id: PeerId,
    /// Remote socket address.
    pub remote_addr: SocketAddr,
    /// When the peer connected.
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug)]
struct PeerEntry {
    info: PeerInfo,
    outbound: mpsc::UnboundedSender<Message>,
}

/// Connected peers and their outbound queues.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: RwLock<HashMap<PeerId, PeerEntry>>,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer whose writer drains `outbound`.
    pub fn insert(&self, info: PeerInfo, outbound: mpsc::UnboundedSender<Message>) {
        self.peers
            .write()
            .insert(info.id, PeerEntry { info, outbound });
    }

    /// Forget a peer.
    pub fn remove(&self, id: &PeerId) -> bool {
        self.peers.write().remove(id).is_some()
    }

    /// Queue a text frame for one peer. Returns false if the peer is gone.
    pub fn send_to(&self, id: &PeerId, text: &str) -> bool {
        self.peers
            .read()
            .get(id)
            .is_some_and(|peer| peer.outbound.send(Message::Text(text.to_owned().into())).is_ok())
    }

    /// Queue a text frame for every peer. Returns how many accepted it.
    pub fn broadcast(&self, text: &str) -> usize {
        self.peers
            .read()
            .values()
            .filter(|peer| peer.outbound.send(Message::Text(text.to_owned().into())).is_ok())
            .count()
    }

    /// Snapshot of connected peers, oldest first.
    pub fn list(&self) -> Vec<PeerInfo> {
        let mut peers: Vec<PeerInfo> = self
            .peers
            .read()
            .values()
            .map(|peer| peer.info.clone())
            .collect();
        peers.sort_by_key(|peer| peer.connected_at);
        peers
    }

    /// Number of connected peers.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether no peer is connected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
