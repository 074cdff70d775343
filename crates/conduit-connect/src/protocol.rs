//! JSON-RPC 2.0 envelopes spoken between peers.
//!
//! Messages travel as WebSocket text frames, one envelope per frame. Requests
//! carry an `id` and expect a response echoing it; notifications carry no
//! `id` and never receive a reply.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value, json};

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method names understood by the protocol server.
pub mod methods {
    /// List the tools of a domain.
    pub const TOOLS_LIST: &str = "tools/list";
    /// Execute a tool.
    pub const TOOLS_CALL: &str = "tools/call";
    /// Server identity and capabilities.
    pub const CONNECTION_INFO: &str = "connection/info";
    /// Liveness check.
    pub const PING: &str = "ping";
    /// Notification pushed to a peer right after it connects.
    pub const SERVER_CONNECTED: &str = "server/connected";
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON-RPC Base Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request correlation id. Peers may use strings or any JSON number.
///
/// Numbers are kept as received so fractional and out-of-range ids echo back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String id.
    String(String),
    /// Numeric id.
    Number(Number),
}

impl RequestId {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => Some(Self::Number(n.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// A JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID for correlating responses.
    pub id: RequestId,
    /// Method name to call.
    pub method: String,
    /// Method parameters (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC notification (no id, no response expected).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Method parameters (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID this response is for.
    pub id: RequestId,
    /// Result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    pub fn failure(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Get the result, or return an error if this is an error response.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(error) = self.error {
            Err(error)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// A JSON-RPC error object.
///
/// Every error sent on the wire carries `code: -1`. The standard JSON-RPC
/// code, when one applies, travels in `data.jsonrpcCode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes, reported through `data.jsonrpcCode`.
impl JsonRpcError {
    /// Parse error - Invalid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid Request - Not a valid Request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Wire code of every error object.
    pub const ERROR_CODE: i64 = -1;

    /// Create an error object with an explicit wire code.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a wire error that reports `jsonrpc_code` in its data.
    pub fn standard(jsonrpc_code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Self::ERROR_CODE,
            message: message.into(),
            data: Some(json!({ "jsonrpcCode": jsonrpc_code })),
        }
    }

    /// Invalid JSON.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::standard(Self::PARSE_ERROR, message)
    }

    /// Not a valid request envelope.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::standard(Self::INVALID_REQUEST, message)
    }

    /// Unknown method.
    pub fn method_not_found(method: &str) -> Self {
        Self::standard(Self::METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    /// Bad parameters.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::standard(Self::INVALID_PARAMS, message)
    }

    /// Tool execution failure.
    pub fn tool_failure(message: impl Into<String>) -> Self {
        Self::new(Self::ERROR_CODE, message)
    }

    /// Standard JSON-RPC code carried in `data`, if any.
    pub fn jsonrpc_code(&self) -> Option<i64> {
        self.data
            .as_ref()
            .and_then(|d| d.get("jsonrpcCode"))
            .and_then(Value::as_i64)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Method Parameters
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters of `tools/list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolListParams {
    /// Domain to list; defaults to "filesystem".
    #[serde(default)]
    pub domain: Option<String>,
}

/// Parameters of `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallParams {
    /// Capability domain of the tool.
    pub domain: String,
    /// Tool name.
    pub tool_name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// A classified inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A notification; never answered.
    Notification(JsonRpcNotification),
    /// A response to a request this side sent.
    Response(JsonRpcResponse),
}

/// A malformed envelope. `id` is set when the offending message carried one,
/// in which case the sender should get `error` back.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeError {
    /// Id of the offending message, if it could be read.
    pub id: Option<RequestId>,
    /// Error to report.
    pub error: JsonRpcError,
}

impl EnvelopeError {
    fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self { id, error }
    }
}

/// Parse and classify one text frame.
pub fn parse_message(text: &str) -> Result<Incoming, EnvelopeError> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        EnvelopeError::new(
            None,
            JsonRpcError::parse_error(format!("Parse error: {}", e)),
        )
    })?;
    let Value::Object(obj) = value else {
        return Err(EnvelopeError::new(
            None,
            JsonRpcError::invalid_request("Envelope must be a JSON object"),
        ));
    };

    let id = obj.get("id").and_then(RequestId::from_value);

    if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(EnvelopeError::new(
            id,
            JsonRpcError::invalid_request("Unsupported or missing jsonrpc version"),
        ));
    }

    if obj.contains_key("result") || obj.contains_key("error") {
        return parse_response(id, obj);
    }

    let method = match obj.get("method").and_then(Value::as_str) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => {
            return Err(EnvelopeError::new(
                id,
                JsonRpcError::invalid_request("Missing method"),
            ));
        }
    };
    let params = obj.get("params").cloned();

    Ok(match id {
        Some(id) => Incoming::Request(JsonRpcRequest::new(id, method, params)),
        None => Incoming::Notification(JsonRpcNotification::new(method, params)),
    })
}

fn parse_response(id: Option<RequestId>, obj: Map<String, Value>) -> Result<Incoming, EnvelopeError> {
    if id.is_none() {
        return Err(EnvelopeError::new(
            None,
            JsonRpcError::invalid_request("Response without id"),
        ));
    }
    serde_json::from_value(Value::Object(obj))
        .map(Incoming::Response)
        .map_err(|e| EnvelopeError::new(id, JsonRpcError::invalid_request(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new("1", methods::PING, None);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": "1", "method": "ping"}));
    }

    #[test]
    fn test_response_into_result() {
        let ok = JsonRpcResponse::success(RequestId::from(7), json!({"pong": true}));
        assert_eq!(ok.into_result().unwrap(), json!({"pong": true}));

        let err = JsonRpcResponse::failure("x".into(), JsonRpcError::tool_failure("boom"));
        assert!(err.is_error());
        let e = err.into_result().unwrap_err();
        assert_eq!(e.code, -1);
        assert_eq!(e.message, "boom");
    }

    #[test]
    fn test_parse_request_and_notification() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","id":"1","method":"ping"}"#).unwrap();
        assert_eq!(msg, Incoming::Request(JsonRpcRequest::new("1", "ping", None)));

        let msg = parse_message(r#"{"jsonrpc":"2.0","id":5,"method":"tools/list","params":{}}"#)
            .unwrap();
        assert!(matches!(msg, Incoming::Request(ref r) if r.id == RequestId::from(5)));

        let msg = parse_message(r#"{"jsonrpc":"2.0","method":"server/connected"}"#).unwrap();
        assert!(matches!(msg, Incoming::Notification(_)));
    }

    #[test]
    fn test_parse_response() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","id":"a-1","result":{"ok":1}}"#).unwrap();
        let Incoming::Response(resp) = msg else {
            panic!("expected response");
        };
        assert_eq!(resp.id, RequestId::from("a-1"));

        let err = parse_message(r#"{"jsonrpc":"2.0","result":1}"#).unwrap_err();
        assert!(err.id.is_none());
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse_message("not json").unwrap_err();
        assert_eq!(err.error.code, -1);
        assert_eq!(err.error.jsonrpc_code(), Some(JsonRpcError::PARSE_ERROR));
        assert!(err.id.is_none());

        let err = parse_message(r#"{"jsonrpc":"1.0","id":"2","method":"ping"}"#).unwrap_err();
        assert_eq!(err.error.code, -1);
        assert_eq!(err.error.jsonrpc_code(), Some(JsonRpcError::INVALID_REQUEST));
        assert_eq!(err.id, Some(RequestId::from("2")));

        let err = parse_message(r#"{"jsonrpc":"2.0","id":"3"}"#).unwrap_err();
        assert_eq!(err.error.code, -1);
        assert_eq!(err.error.jsonrpc_code(), Some(JsonRpcError::INVALID_REQUEST));
        assert!(err.error.message.contains("method"));

        let err = parse_message("[1,2]").unwrap_err();
        assert_eq!(err.error.code, -1);
        assert_eq!(err.error.jsonrpc_code(), Some(JsonRpcError::INVALID_REQUEST));
    }

    #[test]
    fn test_error_wire_shape() {
        let value = serde_json::to_value(JsonRpcError::method_not_found("nope")).unwrap();
        assert_eq!(
            value,
            json!({
                "code": -1,
                "message": "Method not found: nope",
                "data": {"jsonrpcCode": -32601}
            })
        );

        let value = serde_json::to_value(JsonRpcError::tool_failure("boom")).unwrap();
        assert_eq!(value, json!({"code": -1, "message": "boom"}));
        assert_eq!(JsonRpcError::tool_failure("boom").jsonrpc_code(), None);
    }

    #[test]
    fn test_non_integer_ids_are_requests() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","id":1.5,"method":"ping"}"#).unwrap();
        let Incoming::Request(req) = msg else {
            panic!("expected request");
        };
        let response = JsonRpcResponse::success(req.id, json!({"pong": true}));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], json!(1.5));

        let msg =
            parse_message(r#"{"jsonrpc":"2.0","id":18446744073709551615,"method":"ping"}"#)
                .unwrap();
        let Incoming::Request(req) = msg else {
            panic!("expected request");
        };
        assert_eq!(req.id.to_string(), "18446744073709551615");

        let err = parse_message(r#"{"jsonrpc":"2.0","id":2.5,"method":""}"#).unwrap_err();
        assert_eq!(err.id, Some(RequestId::Number(Number::from_f64(2.5).unwrap())));
    }

    #[test]
    fn test_tool_call_params() {
        let params: ToolCallParams = serde_json::from_value(json!({
            "domain": "terminal",
            "toolName": "execute_command",
            "arguments": {"command": "echo hi"}
        }))
        .unwrap();
        assert_eq!(params.tool_name, "execute_command");
        assert_eq!(params.arguments["command"], "echo hi");

        let listed: ToolListParams = serde_json::from_value(json!({})).unwrap();
        assert!(listed.domain.is_none());
    }
}
