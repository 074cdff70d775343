//! WebSocket peer lifecycle.
//!
//! Each peer gets a writer task draining an unbounded queue into the socket.
//! Requests are handled on their own tasks and answer through that queue, so
//! a slow tool never blocks `ping` on the same socket. Those tasks belong to
//! the peer and are aborted when it goes away.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use conduit_connect::{
    EnvelopeError, Incoming, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, methods,
    parse_message,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::handlers::{connected_params, dispatch};
use crate::peers::{PeerId, PeerInfo};
use crate::state::AppState;

/// Handle a WebSocket peer until it disconnects or the server shuts down.
pub async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let peer_id = PeerId::new();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
        let _ = sender.close().await;
    });

    state.peers().insert(
        PeerInfo {
            id: peer_id,
            remote_addr: addr,
            connected_at: Utc::now(),
        },
        tx.clone(),
    );
    tracing::info!(peer_id = %peer_id, remote_addr = %addr, "peer connected");

    queue(
        &tx,
        &JsonRpcNotification::new(
            methods::SERVER_CONNECTED,
            Some(connected_params(peer_id, &state)),
        ),
    );

    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        let frame = tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = tx.send(Message::Close(None));
                break;
            }
            Some(joined) = in_flight.join_next() => {
                if let Err(e) = joined
                    && e.is_panic()
                {
                    tracing::error!(peer_id = %peer_id, error = %e, "request task panicked");
                }
                continue;
            }
            frame = receiver.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text.to_string(),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!(peer_id = %peer_id, "dropping non-UTF-8 binary frame");
                    continue;
                }
            },
            Some(Ok(Message::Ping(data))) => {
                let _ = tx.send(Message::Pong(data));
                continue;
            }
            Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                tracing::warn!(peer_id = %peer_id, error = %e, "WebSocket error");
                break;
            }
        };

        match parse_message(&text) {
            Ok(Incoming::Request(request)) => {
                let state = state.clone();
                let tx = tx.clone();
                in_flight.spawn(async move {
                    let response = handle_request(request, &state).await;
                    queue(&tx, &response);
                });
            }
            Ok(Incoming::Notification(notification)) => {
                // Executed like a request, but never answered.
                let state = state.clone();
                in_flight.spawn(async move {
                    if let Err(e) =
                        dispatch(&notification.method, notification.params, &state).await
                    {
                        tracing::debug!(
                            method = %notification.method,
                            error = %e,
                            "notification failed"
                        );
                    }
                });
            }
            Ok(Incoming::Response(response)) => {
                tracing::debug!(peer_id = %peer_id, request_id = %response.id, "ignoring response from peer");
            }
            Err(EnvelopeError { id: Some(id), error }) => {
                tracing::debug!(peer_id = %peer_id, error = %error.message, "rejecting malformed request");
                queue(&tx, &JsonRpcResponse::failure(id, error));
            }
            Err(EnvelopeError { id: None, error }) => {
                tracing::warn!(peer_id = %peer_id, error = %error.message, "dropping malformed message");
            }
        }
    }

    state.peers().remove(&peer_id);
    if !in_flight.is_empty() {
        tracing::debug!(peer_id = %peer_id, count = in_flight.len(), "aborting in-flight requests");
    }
    in_flight.shutdown().await;
    drop(tx);
    let _ = writer.await;
    tracing::info!(peer_id = %peer_id, "peer disconnected");
}

async fn handle_request(request: JsonRpcRequest, state: &AppState) -> JsonRpcResponse {
    tracing::debug!(method = %request.method, request_id = %request.id, "handling request");
    match dispatch(&request.method, request.params, state).await {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(error) => JsonRpcResponse::failure(request.id, error),
    }
}

fn queue<T: Serialize>(tx: &mpsc::UnboundedSender<Message>, message: &T) {
    match serde_json::to_string(message) {
        Ok(text) => {
            let _ = tx.send(Message::Text(text.into()));
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize outbound message"),
    }
}
