//! Protocol server driven by real WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use conduit_connect::{
    ConnectionDescriptor, ConnectionRegistry, ConnectionType, MemoryStore, ToolRouter, Transports,
};
use conduit_server::{ProtocolServer, ServerConfig, ServerHandle};
use conduit_tools::ToolRegistry;
use conduit_tools::builtin::{BuiltinConfig, register_all};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn tools() -> Arc<ToolRegistry> {
    let mut tools = ToolRegistry::new();
    register_all(&mut tools, &BuiltinConfig::default());
    Arc::new(tools)
}

async fn start() -> ServerHandle {
    ProtocolServer::new(
        ServerConfig::default().with_bind_address("127.0.0.1:0".parse().unwrap()),
        tools(),
    )
    .start()
    .await
    .unwrap()
}

/// Connect and consume the `server/connected` greeting.
async fn connect(server: &ServerHandle) -> (Client, Value) {
    let (mut ws, _) = connect_async(server.url()).await.unwrap();
    let greeting = recv(&mut ws).await;
    (ws, greeting)
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn recv(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn wait_for_peers(server: &ServerHandle, count: usize) {
    for _ in 0..100 {
        if server.peer_count() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {} peers, have {}", count, server.peer_count());
}

#[tokio::test]
async fn test_ping() {
    let server = start().await;
    let (mut ws, _) = connect(&server).await;

    send(&mut ws, json!({"jsonrpc": "2.0", "id": "1", "method": "ping"})).await;
    let response = recv(&mut ws).await;

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], "1");
    assert_eq!(response["result"]["pong"], true);
    let ts = response["result"]["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    assert!(response.get("error").is_none());
}

#[tokio::test]
async fn test_connected_notification() {
    let server = start().await;
    let (_ws, greeting) = connect(&server).await;

    assert_eq!(greeting["method"], "server/connected");
    assert!(greeting.get("id").is_none());
    let params = &greeting["params"];
    assert!(params["peerId"].is_string());
    assert_eq!(params["server"]["name"], "conduit");
    let domains = params["capabilities"]["tools"]["domains"].as_array().unwrap();
    assert!(domains.contains(&json!("terminal")));
}

#[tokio::test]
async fn test_tools_list_and_call() {
    let server = start().await;
    let (mut ws, _) = connect(&server).await;

    send(
        &mut ws,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {"domain": "terminal"}}),
    )
    .await;
    let listed = recv(&mut ws).await;
    assert_eq!(listed["id"], 1);
    let names: Vec<&str> = listed["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"execute_command"));

    send(
        &mut ws,
        json!({
            "jsonrpc": "2.0",
            "id": "call-1",
            "method": "tools/call",
            "params": {
                "domain": "terminal",
                "toolName": "execute_command",
                "arguments": {"command": "echo hi"}
            }
        }),
    )
    .await;
    let called = recv(&mut ws).await;
    assert_eq!(called["id"], "call-1");
    assert_eq!(called["result"]["success"], true);
    assert_eq!(called["result"]["stdout"], "hi");
    assert_eq!(called["result"]["stderr"], "");
}

#[tokio::test]
async fn test_tool_exception_is_error_object() {
    let server = start().await;
    let (mut ws, _) = connect(&server).await;

    send(
        &mut ws,
        json!({
            "jsonrpc": "2.0",
            "id": "x",
            "method": "tools/call",
            "params": {"domain": "terminal", "toolName": "launch_rocket", "arguments": {}}
        }),
    )
    .await;
    let response = recv(&mut ws).await;
    assert_eq!(response["id"], "x");
    assert_eq!(response["error"]["code"], -1);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn test_malformed_envelopes() {
    let server = start().await;
    let (mut ws, _) = connect(&server).await;

    send(&mut ws, json!({"jsonrpc": "1.0", "id": "a", "method": "ping"})).await;
    let response = recv(&mut ws).await;
    assert_eq!(response["id"], "a");
    assert_eq!(response["error"]["code"], -1);
    assert_eq!(response["error"]["data"]["jsonrpcCode"], -32600);

    send(&mut ws, json!({"jsonrpc": "2.0", "id": "b"})).await;
    let response = recv(&mut ws).await;
    assert_eq!(response["id"], "b");
    assert_eq!(response["error"]["code"], -1);
    assert_eq!(response["error"]["data"]["jsonrpcCode"], -32600);

    send(&mut ws, json!({"jsonrpc": "2.0", "id": "c", "method": "tools/nope"})).await;
    let response = recv(&mut ws).await;
    assert_eq!(response["id"], "c");
    assert_eq!(response["error"]["code"], -1);
    assert_eq!(response["error"]["data"]["jsonrpcCode"], -32601);
    assert_eq!(response["error"]["message"], "Method not found: tools/nope");
}

#[tokio::test]
async fn test_non_integer_ids_are_answered() {
    let server = start().await;
    let (mut ws, _) = connect(&server).await;

    send(&mut ws, json!({"jsonrpc": "2.0", "id": 1.5, "method": "ping"})).await;
    let response = recv(&mut ws).await;
    assert_eq!(response["id"], json!(1.5));
    assert_eq!(response["result"]["pong"], true);

    send(
        &mut ws,
        json!({"jsonrpc": "2.0", "id": u64::MAX, "method": "tools/nope"}),
    )
    .await;
    let response = recv(&mut ws).await;
    assert_eq!(response["id"], json!(u64::MAX));
    assert_eq!(response["error"]["code"], -1);
}

#[tokio::test]
async fn test_id_less_messages_get_no_reply() {
    let server = start().await;
    let (mut ws, _) = connect(&server).await;

    // A notification, an id-less malformed envelope and raw garbage.
    send(&mut ws, json!({"jsonrpc": "2.0", "method": "ping"})).await;
    send(&mut ws, json!({"jsonrpc": "1.0", "method": "ping"})).await;
    ws.send(Message::Text("{not json".into())).await.unwrap();

    send(&mut ws, json!({"jsonrpc": "2.0", "id": "after", "method": "ping"})).await;
    let response = recv(&mut ws).await;
    assert_eq!(response["id"], "after");
}

#[tokio::test]
async fn test_peer_tracking_and_broadcast() {
    let server = start().await;
    let (mut a, _) = connect(&server).await;
    let (mut b, greeting_b) = connect(&server).await;
    wait_for_peers(&server, 2).await;

    let delivered = server.broadcast("tools/changed", Some(json!({"domain": "calendar"})));
    assert_eq!(delivered, 2);
    for ws in [&mut a, &mut b] {
        let message = recv(ws).await;
        assert_eq!(message["method"], "tools/changed");
        assert_eq!(message["params"]["domain"], "calendar");
    }

    let b_id = greeting_b["params"]["peerId"].as_str().unwrap().parse().unwrap();
    assert!(server.send_to(&b_id, "direct", None));
    assert_eq!(recv(&mut b).await["method"], "direct");

    b.close(None).await.unwrap();
    wait_for_peers(&server, 1).await;
    assert!(!server.send_to(&b_id, "direct", None));
    assert_eq!(server.broadcast("again", None), 1);
}

#[tokio::test]
async fn test_shutdown_closes_peers() {
    let server = start().await;
    let (mut ws, _) = connect(&server).await;
    wait_for_peers(&server, 1).await;

    server.shutdown().await.unwrap();

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn test_shutdown_does_not_wait_for_in_flight_requests() {
    let server = start().await;
    let (mut ws, _) = connect(&server).await;
    wait_for_peers(&server, 1).await;

    send(
        &mut ws,
        json!({
            "jsonrpc": "2.0",
            "id": "slow",
            "method": "tools/call",
            "params": {"domain": "terminal", "toolName": "execute_command", "arguments": {"command": "sleep 10"}}
        }),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(3), server.shutdown()).await;
    assert!(stopped.is_ok(), "shutdown waited on the running command");

    let closed = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(Message::Text(text))) => {
                    panic!("unexpected frame after shutdown: {}", text)
                }
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn test_disconnect_cancels_in_flight_requests() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("finished");

    let server = start().await;
    let (mut ws, _) = connect(&server).await;
    wait_for_peers(&server, 1).await;

    send(
        &mut ws,
        json!({
            "jsonrpc": "2.0",
            "id": "slow",
            "method": "tools/call",
            "params": {
                "domain": "terminal",
                "toolName": "execute_command",
                "arguments": {"command": format!("sleep 1 && echo done > '{}'", marker.display())}
            }
        }),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    ws.close(None).await.unwrap();
    drop(ws);
    wait_for_peers(&server, 0).await;

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(!marker.exists(), "command kept running after its peer left");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_registry_socket_peer_round_trip() {
    let server = start().await;

    let flag = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let registry = Arc::new(
        ConnectionRegistry::new(Arc::new(MemoryStore::new()), Transports::default())
            .with_server_flag(flag),
    );
    let router = ToolRouter::new(registry.clone(), Arc::new(ToolRegistry::new()));

    registry
        .add(
            ConnectionDescriptor::new(
                "Loopback shell",
                ConnectionType::SocketPeer,
                format!("{}/terminal", server.url()),
            )
            .with_id("loopback"),
            false,
        )
        .await
        .unwrap();

    let result = router
        .execute("loopback", "execute_command", json!({"command": "echo hi"}))
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(result.get("stdout"), Some(&json!("hi")));
    assert!(registry.stats().server_running);
    wait_for_peers(&server, 1).await;

    assert!(registry.remove("loopback").await);
    wait_for_peers(&server, 0).await;
}
