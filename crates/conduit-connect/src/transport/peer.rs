use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Transport, TransportHandle};
use crate::error::TransportError;
use crate::pending::PendingTable;
use crate::protocol::{
    Incoming, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId, parse_message,
};
use crate::types::ConnectionDescriptor;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How often the reader sweeps expired pending requests.
const SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// How long `close` waits for the close frame to flush.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Opens a persistent WebSocket to a peer.
#[derive(Debug, Clone)]
pub struct SocketPeerTransport {
    connect_timeout: Duration,
}

impl SocketPeerTransport {
    /// Create an adapter that abandons handshakes after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Transport for SocketPeerTransport {
    async fn establish(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<TransportHandle, TransportError> {
        let link = PeerLink::connect(&descriptor.endpoint, self.connect_timeout).await?;
        tracing::info!(connection = %descriptor.id, endpoint = %descriptor.endpoint, "peer link open");
        Ok(TransportHandle::Peer(link))
    }
}

/// An open WebSocket link that correlates outbound requests with responses.
///
/// A background reader resolves pending requests by id, ignores responses
/// nobody is waiting for, and sweeps expired entries. When the socket closes
/// the reader cancels [`PeerLink::closed_token`] and fails every waiter.
pub struct PeerLink {
    endpoint: String,
    writer: Mutex<SplitSink<WsStream, Message>>,
    pending: Arc<PendingTable>,
    next_id: AtomicU64,
    id_prefix: String,
    closed: CancellationToken,
}

impl PeerLink {
    /// Open a link to `endpoint`, failing if the handshake takes longer than `timeout`.
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Arc<Self>, TransportError> {
        let url = Url::parse(endpoint)
            .map_err(|e| TransportError::invalid_endpoint(endpoint, e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::invalid_endpoint(
                endpoint,
                "expected a ws or wss URL",
            ));
        }

        // Dropping the handshake future on timeout closes the half-open socket.
        let (stream, _response) = match tokio::time::timeout(timeout, connect_async(endpoint)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout(timeout)),
        };

        let (sink, source) = stream.split();
        let pending = Arc::new(PendingTable::new());
        let closed = CancellationToken::new();

        tokio::spawn(read_loop(
            source,
            pending.clone(),
            closed.clone(),
            endpoint.to_string(),
        ));

        let mut id_prefix = uuid::Uuid::new_v4().simple().to_string();
        id_prefix.truncate(8);

        Ok(Arc::new(Self {
            endpoint: endpoint.to_string(),
            writer: Mutex::new(sink),
            pending,
            next_id: AtomicU64::new(1),
            id_prefix,
            closed,
        }))
    }

    /// Send a request and wait for the response with the same id.
    ///
    /// On timeout the pending entry is removed, so a late response is dropped.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<JsonRpcResponse, TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = RequestId::String(format!("{}-{}", self.id_prefix, n));
        let rx = self.pending.register(id.clone(), timeout)?;
        let _guard = PendingGuard {
            table: &self.pending,
            id: id.clone(),
        };

        let text = serde_json::to_string(&JsonRpcRequest::new(id.clone(), method, params))?;
        tracing::trace!(endpoint = %self.endpoint, request_id = %id, method, "sending request");
        self.send_text(text).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) if self.closed.is_cancelled() => Err(TransportError::Closed),
            Ok(Err(_)) | Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    /// Send a notification; no response is expected.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let text = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.send_text(text).await
    }

    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| match e {
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                    TransportError::Closed
                }
                other => TransportError::WebSocket(other),
            })
    }

    /// Close the socket and fail every pending request.
    pub async fn close(&self) {
        self.closed.cancel();
        let mut writer = self.writer.lock().await;
        if let Ok(Err(e)) = tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await {
            tracing::debug!(endpoint = %self.endpoint, error = %e, "error closing peer socket");
        }
        self.pending.fail_all();
    }

    /// Whether the socket is still open.
    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Token cancelled when the link closes for any reason.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Remote endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerLink")
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        // Stops the reader, which owns the read half of the socket.
        self.closed.cancel();
    }
}

struct PendingGuard<'a> {
    table: &'a PendingTable,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.discard(&self.id);
    }
}

async fn read_loop(
    mut source: SplitStream<WsStream>,
    pending: Arc<PendingTable>,
    closed: CancellationToken,
    endpoint: String,
) {
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            _ = sweep.tick() => {
                pending.expire(Instant::now());
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(&pending, text.as_str()),
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => dispatch(&pending, text),
                    Err(_) => tracing::warn!(endpoint = %endpoint, "ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!(endpoint = %endpoint, "peer closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "peer socket error");
                    break;
                }
            }
        }
    }

    closed.cancel();
    let failed = pending.fail_all();
    if failed > 0 {
        tracing::debug!(endpoint = %endpoint, failed, "failed pending requests on close");
    }
}

fn dispatch(pending: &PendingTable, text: &str) {
    match parse_message(text) {
        Ok(Incoming::Response(response)) => {
            let id = response.id.clone();
            if !pending.resolve(response) {
                tracing::debug!(request_id = %id, "ignoring response with unknown id");
            }
        }
        Ok(Incoming::Notification(notification)) => {
            tracing::debug!(method = %notification.method, "peer notification");
        }
        Ok(Incoming::Request(request)) => {
            tracing::debug!(method = %request.method, "ignoring request from peer");
        }
        Err(e) => {
            tracing::warn!(code = e.error.code, error = %e.error.message, "malformed message from peer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_ws_endpoint() {
        let err = PeerLink::connect("http://127.0.0.1:1", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_refused_connection_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = PeerLink::connect(&format!("ws://{}", addr), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::WebSocket(_)));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        // Accepts TCP but never answers the upgrade.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let err = PeerLink::connect(&format!("ws://{}", addr), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }
}
