//! Embedded JSON-RPC server for conduit.
//!
//! Remote processes connect over WebSocket as *peers* and call into the
//! local [`ToolRegistry`] with JSON-RPC 2.0 envelopes:
//!
//! - `tools/list {domain}` lists a domain's tools
//! - `tools/call {domain, toolName, arguments}` runs one
//! - `connection/info` describes this server
//! - `ping` answers `{pong: true, timestamp}`
//!
//! Every new peer first receives a `server/connected` notification.
//!
//! # Example
//!
//! ```ignore
//! use conduit_server::{ProtocolServer, ServerConfig};
//!
//! let handle = ProtocolServer::new(ServerConfig::default(), tools).start().await?;
//! println!("listening on {}", handle.local_addr());
//! handle.broadcast("tools/changed", None);
//! handle.shutdown().await?;
//! ```

pub mod config;
mod connection;
pub mod error;
pub mod handlers;
pub mod peers;
pub mod state;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use peers::{PeerId, PeerInfo};
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use conduit_connect::JsonRpcNotification;
use conduit_tools::ToolRegistry;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The embedded protocol server, before it is started.
pub struct ProtocolServer {
    state: AppState,
    running: Arc<AtomicBool>,
}

impl ProtocolServer {
    /// Create a server exposing `tools`.
    pub fn new(config: ServerConfig, tools: Arc<ToolRegistry>) -> Self {
        Self {
            state: AppState::new(config, tools),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a flag that is true while the server is listening.
    pub fn with_running_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.running = flag;
        self
    }

    /// Application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router. Any path upgrades to the peer socket.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/", get(ws_handler))
            .route("/{*path}", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve in the background.
    pub async fn start(self) -> Result<ServerHandle> {
        let addr = self.state.config.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        let router = self.router();

        info!("Protocol server listening on {}", local_addr);
        self.running.store(true, Ordering::SeqCst);

        let shutdown = self.state.shutdown.clone();
        let running = self.running.clone();
        let task = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
            running.store(false, Ordering::SeqCst);
            result
        });

        Ok(ServerHandle {
            local_addr,
            state: self.state,
            running: self.running,
            task,
        })
    }

    /// Serve until shut down through the state's token.
    pub async fn run(self) -> Result<()> {
        self.start().await?.wait().await
    }
}

/// A running protocol server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    state: AppState,
    running: Arc<AtomicBool>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// WebSocket URL peers connect to.
    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Whether the server is still listening.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.state.peers().len()
    }

    /// Connected peers.
    pub fn peers(&self) -> Vec<PeerInfo> {
        self.state.peers().list()
    }

    /// Push a notification to every peer. Returns how many received it.
    pub fn broadcast(&self, method: &str, params: Option<Value>) -> usize {
        match serde_json::to_string(&JsonRpcNotification::new(method, params)) {
            Ok(text) => self.state.peers().broadcast(&text),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize broadcast");
                0
            }
        }
    }

    /// Push a notification to one peer.
    pub fn send_to(&self, peer: &PeerId, method: &str, params: Option<Value>) -> bool {
        match serde_json::to_string(&JsonRpcNotification::new(method, params)) {
            Ok(text) => self.state.peers().send_to(peer, &text),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize notification");
                false
            }
        }
    }

    /// Stop accepting peers, close open sockets and wait for the server to exit.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down protocol server");
        self.state.shutdown.cancel();
        self.wait().await
    }

    /// Wait for the server to exit.
    pub async fn wait(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result.map_err(ServerError::Io),
            Err(e) => Err(ServerError::Internal(format!("server task failed: {}", e))),
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .field("peers", &self.peer_count())
            .finish()
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| connection::handle_socket(socket, state, addr))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "peers": state.peers().len(),
    }))
}
