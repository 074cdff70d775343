//! JSON-RPC method handlers.

use chrono::Utc;
use conduit_connect::{JsonRpcError, ToolCallParams, ToolListParams, methods};
use serde_json::{Value, json};

use crate::peers::PeerId;
use crate::state::AppState;

/// Domain listed by `tools/list` when the request names none.
pub const DEFAULT_LIST_DOMAIN: &str = "filesystem";

/// Run one method and produce its result or error object.
pub async fn dispatch(
    method: &str,
    params: Option<Value>,
    state: &AppState,
) -> Result<Value, JsonRpcError> {
    match method {
        methods::PING => Ok(json!({
            "pong": true,
            "timestamp": Utc::now().to_rfc3339(),
        })),
        methods::TOOLS_LIST => tools_list(params, state),
        methods::TOOLS_CALL => tools_call(params, state).await,
        methods::CONNECTION_INFO => Ok(server_info(state)),
        other => Err(JsonRpcError::method_not_found(other)),
    }
}

fn tools_list(params: Option<Value>, state: &AppState) -> Result<Value, JsonRpcError> {
    let params: ToolListParams = match params {
        None | Some(Value::Null) => ToolListParams::default(),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))?,
    };
    let domain = params
        .domain
        .unwrap_or_else(|| DEFAULT_LIST_DOMAIN.to_string());
    let tools = state.tools().list_for_domain(&domain);
    Ok(json!({"domain": domain, "tools": tools}))
}

async fn tools_call(params: Option<Value>, state: &AppState) -> Result<Value, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    let ToolCallParams {
        domain,
        tool_name,
        arguments,
    } = serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))?;

    match state.tools().execute(&domain, &tool_name, arguments).await {
        Ok(result) => Ok(result.into_value()),
        Err(e) => Err(JsonRpcError::tool_failure(e.to_string())),
    }
}

/// Static identity and capabilities of this server.
pub fn server_info(state: &AppState) -> Value {
    json!({
        "server": server_identity(state),
        "capabilities": capabilities(state),
        "protocol": "jsonrpc-2.0",
    })
}

/// Params of the `server/connected` notification sent to a new peer.
pub fn connected_params(peer_id: PeerId, state: &AppState) -> Value {
    json!({
        "peerId": peer_id,
        "server": server_identity(state),
        "capabilities": capabilities(state),
        "timestamp": Utc::now().to_rfc3339(),
    })
}

fn server_identity(state: &AppState) -> Value {
    json!({
        "name": state.config().name,
        "version": env!("CARGO_PKG_VERSION"),
    })
}

fn capabilities(state: &AppState) -> Value {
    json!({
        "tools": {"domains": state.tools().domains()},
        "methods": [
            methods::TOOLS_LIST,
            methods::TOOLS_CALL,
            methods::CONNECTION_INFO,
            methods::PING,
        ],
    })
}
