//! Connection registry: the authoritative set of live connections.
//!
//! Each connection lives in a slot holding its descriptor, its runtime state
//! and a per-connection async lock. Every operation that establishes or
//! tears down a transport takes that lock, so two operations on the same id
//! never race on its handle while different ids proceed independently. The
//! map itself is only locked briefly and never across an await.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{ConnectError, Result, TransportError};
use crate::store::ConnectionStore;
use crate::transport::{PeerLink, TransportHandle, Transports};
use crate::types::{
    ConnectionDescriptor, ConnectionInfo, ConnectionPatch, ConnectionStatus, ConnectionType,
    ReconnectOutcome, RegistryStats, TestOutcome,
};

#[derive(Debug)]
struct ConnectionState {
    status: ConnectionStatus,
    last_connected_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    handle: Option<TransportHandle>,
    generation: u64,
}

#[derive(Debug)]
struct ConnectionSlot {
    id: String,
    seq: u64,
    kind: ConnectionType,
    descriptor: RwLock<ConnectionDescriptor>,
    state: Mutex<ConnectionState>,
    establish_lock: tokio::sync::Mutex<()>,
}

impl ConnectionSlot {
    fn new(seq: u64, descriptor: ConnectionDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            seq,
            kind: descriptor.kind,
            descriptor: RwLock::new(descriptor),
            state: Mutex::new(ConnectionState {
                status: ConnectionStatus::Disconnected,
                last_connected_at: None,
                last_error: None,
                handle: None,
                generation: 0,
            }),
            establish_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn status(&self) -> ConnectionStatus {
        self.state.lock().status
    }

    fn info(&self) -> ConnectionInfo {
        let descriptor = self.descriptor.read();
        let state = self.state.lock();
        ConnectionInfo::project(
            &descriptor,
            state.status,
            state.last_connected_at,
            state.last_error.clone(),
        )
    }

    /// Install a fresh handle. Returns the new generation and the displaced handle.
    fn mark_connected(&self, handle: TransportHandle) -> (u64, Option<TransportHandle>) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.status = ConnectionStatus::Connected;
        state.last_connected_at = Some(Utc::now());
        state.last_error = None;
        (state.generation, state.handle.replace(handle))
    }

    /// Record a failed establishment. A live connection stays connected.
    fn mark_failed(&self, error: String) {
        let mut state = self.state.lock();
        if state.status != ConnectionStatus::Connected {
            state.status = ConnectionStatus::Error;
        }
        state.last_error = Some(error);
    }

    fn take_handle(&self) -> Option<TransportHandle> {
        let mut state = self.state.lock();
        state.status = ConnectionStatus::Disconnected;
        state.handle.take()
    }

    /// The socket of `generation` closed on its own.
    fn link_closed(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation && state.status == ConnectionStatus::Connected {
            state.status = ConnectionStatus::Disconnected;
            state.handle = None;
            tracing::info!(connection = %self.id, "peer link closed; connection disconnected");
        }
    }
}

/// A connected connection, resolved for tool routing.
#[derive(Debug, Clone)]
pub struct ResolvedConnection {
    /// Connection id.
    pub id: String,
    /// Transport type.
    pub kind: ConnectionType,
    /// Endpoint.
    pub endpoint: String,
    /// Open link, for socket-peer connections.
    pub peer: Option<Arc<PeerLink>>,
}

/// Owns every connection and its lifecycle.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<ConnectionSlot>>>,
    store: Arc<dyn ConnectionStore>,
    transports: Transports,
    server_running: Arc<AtomicBool>,
    next_seq: AtomicU64,
    persist_lock: tokio::sync::Mutex<()>,
}

impl ConnectionRegistry {
    /// Create an empty registry persisting through `store`.
    pub fn new(store: Arc<dyn ConnectionStore>, transports: Transports) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            store,
            transports,
            server_running: Arc::new(AtomicBool::new(false)),
            next_seq: AtomicU64::new(0),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Share a "server running" flag reported by [`stats`](Self::stats).
    pub fn with_server_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.server_running = flag;
        self
    }

    /// The flag reported as `serverRunning`.
    pub fn server_flag(&self) -> Arc<AtomicBool> {
        self.server_running.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Establish and register a connection.
    ///
    /// Assigns an id when the descriptor has none. On failure nothing is
    /// inserted. When `persist` is set the descriptor set is saved afterwards.
    pub async fn add(
        &self,
        mut descriptor: ConnectionDescriptor,
        persist: bool,
    ) -> Result<ConnectionInfo> {
        if descriptor.id.is_empty() {
            descriptor.id = Uuid::new_v4().to_string();
        }
        let id = descriptor.id.clone();
        if self.contains(&id) {
            return Err(ConnectError::DuplicateConnection(id));
        }

        let transport = self.transports.for_kind(descriptor.kind);
        let handle = transport.establish(&descriptor).await.map_err(|source| {
            tracing::warn!(connection = %id, error = %source, "failed to add connection");
            ConnectError::connection_failed(&id, source)
        })?;

        let slot = Arc::new(ConnectionSlot::new(self.next_seq(), descriptor));
        let (generation, _) = slot.mark_connected(handle.clone());

        let inserted = match self.connections.write().entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(slot.clone());
                true
            }
        };
        if !inserted {
            if let Some(handle) = slot.take_handle() {
                transport.teardown(handle).await;
            }
            return Err(ConnectError::DuplicateConnection(id));
        }

        watch_link(&slot, generation, &handle);
        tracing::info!(connection = %id, kind = %slot.kind, "connection added");

        if persist {
            self.persist().await;
        }
        Ok(slot.info())
    }

    /// Tear down and forget a connection. Returns false for unknown ids.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.connections.write().remove(id);
        let Some(slot) = removed else {
            return false;
        };

        {
            let _serial = slot.establish_lock.lock().await;
            if let Some(handle) = slot.take_handle() {
                self.transports.for_kind(slot.kind).teardown(handle).await;
            }
        }
        tracing::info!(connection = %id, "connection removed");

        self.persist().await;
        true
    }

    /// Re-run establishment for an existing connection. Failures are reported,
    /// not returned as errors.
    pub async fn test(&self, id: &str) -> TestOutcome {
        let Some(slot) = self.slot(id) else {
            return TestOutcome {
                success: false,
                message: format!("Connection not found: {}", id),
            };
        };

        match self.establish(&slot, false).await {
            Ok(()) => {
                tracing::info!(connection = %id, "connection test succeeded");
                TestOutcome {
                    success: true,
                    message: "Connection successful".to_string(),
                }
            }
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "connection test failed");
                TestOutcome {
                    success: false,
                    message: format!("Connection failed: {}", e),
                }
            }
        }
    }

    /// Retry every connection that is not connected.
    ///
    /// Attempts run concurrently; one failure does not stop the others.
    pub async fn reconnect_all(&self) -> Vec<ReconnectOutcome> {
        let targets: Vec<_> = self
            .slots()
            .into_iter()
            .filter(|slot| slot.status() != ConnectionStatus::Connected)
            .collect();
        tracing::info!(count = targets.len(), "reconnecting connections");

        futures::future::join_all(targets.iter().map(|slot| self.attempt(slot))).await
    }

    /// Load stored descriptors and establish them.
    ///
    /// Every stored connection is registered, including ones that fail to
    /// connect; those rest in the `error` status until retried.
    pub async fn restore(&self) -> Result<Vec<ReconnectOutcome>> {
        let descriptors = self.store.load_connections().await?;

        let mut restored = Vec::with_capacity(descriptors.len());
        {
            let mut connections = self.connections.write();
            for mut descriptor in descriptors {
                if descriptor.id.is_empty() {
                    descriptor.id = Uuid::new_v4().to_string();
                }
                match connections.entry(descriptor.id.clone()) {
                    Entry::Occupied(entry) => {
                        tracing::warn!(connection = %entry.key(), "skipping duplicate stored connection");
                    }
                    Entry::Vacant(entry) => {
                        let slot = Arc::new(ConnectionSlot::new(self.next_seq(), descriptor));
                        entry.insert(slot.clone());
                        restored.push(slot);
                    }
                }
            }
        }
        tracing::info!(count = restored.len(), "restoring stored connections");

        Ok(futures::future::join_all(restored.iter().map(|slot| self.attempt(slot))).await)
    }

    /// Tear down a connection's transport but keep it registered.
    pub async fn disconnect(&self, id: &str) -> Result<()> {
        let slot = self
            .slot(id)
            .ok_or_else(|| ConnectError::ConnectionNotFound(id.to_string()))?;

        let _serial = slot.establish_lock.lock().await;
        if let Some(handle) = slot.take_handle() {
            self.transports.for_kind(slot.kind).teardown(handle).await;
            tracing::info!(connection = %id, "connection disconnected");
        }
        Ok(())
    }

    /// Edit display fields or credentials of a connection.
    pub async fn update(&self, id: &str, patch: ConnectionPatch) -> Result<ConnectionInfo> {
        let slot = self
            .slot(id)
            .ok_or_else(|| ConnectError::ConnectionNotFound(id.to_string()))?;
        patch.apply(&mut slot.descriptor.write());
        self.persist().await;
        Ok(slot.info())
    }

    /// Tear down every transport. Connections stay registered as disconnected.
    pub async fn shutdown(&self) {
        for slot in self.slots() {
            let _serial = slot.establish_lock.lock().await;
            if let Some(handle) = slot.take_handle() {
                self.transports.for_kind(slot.kind).teardown(handle).await;
            }
        }
        tracing::debug!("connection registry shut down");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Every connection in insertion order. Secrets are excluded.
    pub fn list(&self) -> Vec<ConnectionInfo> {
        self.slots().iter().map(|slot| slot.info()).collect()
    }

    /// One connection's projection.
    pub fn get(&self, id: &str) -> Option<ConnectionInfo> {
        self.slot(id).map(|slot| slot.info())
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current descriptors in insertion order, credentials included.
    pub fn descriptors(&self) -> Vec<ConnectionDescriptor> {
        self.slots()
            .iter()
            .map(|slot| slot.descriptor.read().clone())
            .collect()
    }

    /// Aggregate counts.
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            server_running: self.server_running.load(Ordering::SeqCst),
            ..Default::default()
        };
        for info in self.list() {
            stats.total += 1;
            *stats.by_status.entry(info.status).or_default() += 1;
            *stats.by_type.entry(info.kind).or_default() += 1;
            let category = if info.category.is_empty() {
                "uncategorized".to_string()
            } else {
                info.category
            };
            *stats.by_category.entry(category).or_default() += 1;
        }
        stats
    }

    /// Resolve a connected connection for tool routing.
    pub fn resolve(&self, id: &str) -> Result<ResolvedConnection> {
        let slot = self
            .slot(id)
            .ok_or_else(|| ConnectError::ConnectionNotFound(id.to_string()))?;
        let endpoint = slot.descriptor.read().endpoint.clone();
        let state = slot.state.lock();
        if state.status != ConnectionStatus::Connected {
            return Err(ConnectError::ConnectionUnavailable {
                id: id.to_string(),
                status: state.status,
            });
        }
        Ok(ResolvedConnection {
            id: slot.id.clone(),
            kind: slot.kind,
            endpoint,
            peer: state.handle.as_ref().and_then(|h| h.peer().cloned()),
        })
    }

    /// Save the current descriptor set.
    pub async fn save(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.descriptors();
        self.store.save_connections(&snapshot).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn slot(&self, id: &str) -> Option<Arc<ConnectionSlot>> {
        self.connections.read().get(id).cloned()
    }

    fn slots(&self) -> Vec<Arc<ConnectionSlot>> {
        let mut slots: Vec<_> = self.connections.read().values().cloned().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots
    }

    async fn persist(&self) {
        if let Err(e) = self.save().await {
            tracing::error!(error = %e, "failed to persist connections");
        }
    }

    async fn attempt(&self, slot: &Arc<ConnectionSlot>) -> ReconnectOutcome {
        match self.establish(slot, true).await {
            Ok(()) => ReconnectOutcome {
                id: slot.id.clone(),
                success: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!(connection = %slot.id, error = %e, "reconnect failed");
                ReconnectOutcome {
                    id: slot.id.clone(),
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Establish under the slot's lock, replacing any previous handle.
    async fn establish(
        &self,
        slot: &Arc<ConnectionSlot>,
        skip_connected: bool,
    ) -> std::result::Result<(), TransportError> {
        let _serial = slot.establish_lock.lock().await;
        if skip_connected && slot.status() == ConnectionStatus::Connected {
            return Ok(());
        }

        let descriptor = slot.descriptor.read().clone();
        let transport = self.transports.for_kind(slot.kind);
        match transport.establish(&descriptor).await {
            Ok(handle) => {
                let (generation, previous) = slot.mark_connected(handle.clone());
                watch_link(slot, generation, &handle);
                if let Some(previous) = previous {
                    transport.teardown(previous).await;
                }
                Ok(())
            }
            Err(e) => {
                slot.mark_failed(e.to_string());
                Err(e)
            }
        }
    }
}

/// Mark the slot disconnected when a peer link of this generation closes.
fn watch_link(slot: &Arc<ConnectionSlot>, generation: u64, handle: &TransportHandle) {
    let Some(link) = handle.peer() else {
        return;
    };
    let closed = link.closed_token();
    let slot: Weak<ConnectionSlot> = Arc::downgrade(slot);
    tokio::spawn(async move {
        closed.cancelled().await;
        if let Some(slot) = slot.upgrade() {
            slot.link_closed(generation);
        }
    });
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.slots().iter().map(|slot| slot.id.clone()).collect();
        f.debug_struct("ConnectionRegistry")
            .field("connections", &ids)
            .field("transports", &self.transports)
            .finish()
    }
}
