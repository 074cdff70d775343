//! Connection data model: descriptors, runtime status and list projections.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport strategy used to reach a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionType {
    /// HTTP API probed with an authenticated GET.
    Api,
    /// Persistent WebSocket peer speaking JSON-RPC.
    #[serde(alias = "mcp", alias = "websocket")]
    SocketPeer,
    /// Database connection.
    Database,
    /// In-process capabilities (filesystem, terminal, calendar).
    Local,
}

impl ConnectionType {
    /// All connection types.
    pub const ALL: [ConnectionType; 4] = [
        ConnectionType::Api,
        ConnectionType::SocketPeer,
        ConnectionType::Database,
        ConnectionType::Local,
    ];

    /// Wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::SocketPeer => "socket-peer",
            Self::Database => "database",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "socket-peer" | "mcp" | "websocket" => Ok(Self::SocketPeer),
            "database" => Ok(Self::Database),
            "local" => Ok(Self::Local),
            other => Err(format!(
                "unknown connection type '{}' (expected api, socket-peer, database or local)",
                other
            )),
        }
    }
}

/// Externally observable connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Not connected; the initial state and the state after teardown or close.
    Disconnected,
    /// The last establishment succeeded and the transport is live.
    Connected,
    /// The last establishment failed.
    Error,
}

impl ConnectionStatus {
    /// Wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How credentials are presented to an API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthType {
    /// `Authorization: Bearer <token>`.
    #[serde(rename = "bearer")]
    Bearer,
    /// `X-API-Key: <key>`.
    #[serde(rename = "api-key")]
    ApiKey,
    /// OAuth access token, presented as a bearer token.
    #[serde(rename = "oauth")]
    OAuth,
}

/// A credential value. Never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for presenting to a transport.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Persisted description of a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    /// Unique id. Assigned on add when empty.
    #[serde(default)]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Display category.
    #[serde(default)]
    pub category: String,
    /// Transport type; fixed for the life of the connection.
    #[serde(rename = "type")]
    pub kind: ConnectionType,
    /// URI or address of the remote side.
    pub endpoint: String,
    /// Whether establishment needs credentials.
    #[serde(default)]
    pub requires_auth: bool,
    /// How credentials are presented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,
    /// API key credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<Secret>,
    /// Access token credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<Secret>,
    /// Informational capability tags.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ConnectionDescriptor {
    /// Create a descriptor with an empty id.
    pub fn new(name: impl Into<String>, kind: ConnectionType, endpoint: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            kind,
            endpoint: endpoint.into(),
            requires_auth: false,
            auth_type: None,
            api_key: None,
            access_token: None,
            capabilities: Vec::new(),
        }
    }

    /// Set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Add a capability tag.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Require an API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.requires_auth = true;
        self.auth_type = Some(AuthType::ApiKey);
        self.api_key = Some(Secret::new(key));
        self
    }

    /// Require a bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.requires_auth = true;
        self.auth_type = Some(AuthType::Bearer);
        self.access_token = Some(Secret::new(token));
        self
    }

    /// Whether any credential is stored.
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || self.access_token.is_some()
    }
}

/// Editable descriptor fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPatch {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// Replacement capability tags.
    pub capabilities: Option<Vec<String>>,
    /// New auth type.
    pub auth_type: Option<AuthType>,
    /// New API key.
    pub api_key: Option<Secret>,
    /// New access token.
    pub access_token: Option<Secret>,
}

impl ConnectionPatch {
    pub(crate) fn apply(self, descriptor: &mut ConnectionDescriptor) {
        if let Some(name) = self.name {
            descriptor.name = name;
        }
        if let Some(description) = self.description {
            descriptor.description = description;
        }
        if let Some(category) = self.category {
            descriptor.category = category;
        }
        if let Some(capabilities) = self.capabilities {
            descriptor.capabilities = capabilities;
        }
        if let Some(auth_type) = self.auth_type {
            descriptor.auth_type = Some(auth_type);
        }
        if let Some(key) = self.api_key {
            descriptor.requires_auth = true;
            descriptor.api_key = Some(key);
        }
        if let Some(token) = self.access_token {
            descriptor.requires_auth = true;
            descriptor.access_token = Some(token);
        }
    }
}

/// Descriptor and status projection returned by `list()`. Carries no secrets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Connection id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display description.
    pub description: String,
    /// Display category.
    pub category: String,
    /// Transport type.
    #[serde(rename = "type")]
    pub kind: ConnectionType,
    /// Endpoint.
    pub endpoint: String,
    /// Whether credentials are required.
    pub requires_auth: bool,
    /// How credentials are presented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,
    /// Whether credentials are stored.
    pub has_credentials: bool,
    /// Capability tags.
    pub capabilities: Vec<String>,
    /// Current status.
    pub status: ConnectionStatus,
    /// Time of the last successful establishment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Last establishment error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ConnectionInfo {
    pub(crate) fn project(
        descriptor: &ConnectionDescriptor,
        status: ConnectionStatus,
        last_connected_at: Option<DateTime<Utc>>,
        last_error: Option<String>,
    ) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            category: descriptor.category.clone(),
            kind: descriptor.kind,
            endpoint: descriptor.endpoint.clone(),
            requires_auth: descriptor.requires_auth,
            auth_type: descriptor.auth_type,
            has_credentials: descriptor.has_credentials(),
            capabilities: descriptor.capabilities.clone(),
            status,
            last_connected_at,
            last_error,
        }
    }
}

/// Aggregate registry counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    /// Total connections.
    pub total: usize,
    /// Count per status.
    pub by_status: BTreeMap<ConnectionStatus, usize>,
    /// Count per transport type.
    pub by_type: BTreeMap<ConnectionType, usize>,
    /// Count per category.
    pub by_category: BTreeMap<String, usize>,
    /// Whether the embedded protocol server is running.
    pub server_running: bool,
}

/// Outcome of `test(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Whether establishment succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

/// Per-connection outcome of a reconnect or restore sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectOutcome {
    /// Connection id.
    pub id: String,
    /// Whether establishment succeeded.
    pub success: bool,
    /// Failure cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_wire_format() {
        let descriptor = ConnectionDescriptor::new("GitHub", ConnectionType::Api, "https://api.github.com")
            .with_id("github")
            .with_category("development")
            .with_bearer_token("ghp_secret");

        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["type"], "api");
        assert_eq!(value["requiresAuth"], true);
        assert_eq!(value["authType"], "bearer");
        assert_eq!(value["accessToken"], "ghp_secret");

        let back: ConnectionDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn test_type_aliases() {
        let d: ConnectionDescriptor = serde_json::from_value(json!({
            "name": "peer",
            "type": "mcp",
            "endpoint": "ws://localhost:9000"
        }))
        .unwrap();
        assert_eq!(d.kind, ConnectionType::SocketPeer);
        assert!(d.id.is_empty());
        assert!(d.capabilities.is_empty());

        assert_eq!("websocket".parse::<ConnectionType>(), Ok(ConnectionType::SocketPeer));
        assert!("carrier-pigeon".parse::<ConnectionType>().is_err());
    }

    #[test]
    fn test_secret_redacted() {
        let descriptor = ConnectionDescriptor::new("x", ConnectionType::Api, "http://x")
            .with_api_key("hunter2");
        let debug = format!("{:?}", descriptor);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(descriptor.api_key.as_ref().unwrap().expose(), "hunter2");
    }

    #[test]
    fn test_info_excludes_secrets() {
        let descriptor = ConnectionDescriptor::new("x", ConnectionType::Api, "http://x")
            .with_id("x")
            .with_api_key("hunter2");
        let info = ConnectionInfo::project(&descriptor, ConnectionStatus::Connected, None, None);
        let text = serde_json::to_string(&info).unwrap();
        assert!(!text.contains("hunter2"));
        assert!(info.has_credentials);
        assert_eq!(serde_json::to_value(&info).unwrap()["status"], "connected");
    }

    #[test]
    fn test_patch_leaves_identity() {
        let mut descriptor = ConnectionDescriptor::new("old", ConnectionType::Local, "filesystem")
            .with_id("fs");
        ConnectionPatch {
            name: Some("new".to_string()),
            capabilities: Some(vec!["read".to_string()]),
            ..Default::default()
        }
        .apply(&mut descriptor);
        assert_eq!(descriptor.name, "new");
        assert_eq!(descriptor.id, "fs");
        assert_eq!(descriptor.kind, ConnectionType::Local);
        assert_eq!(descriptor.capabilities, vec!["read"]);
    }

    #[test]
    fn test_stats_serialize_keys() {
        let mut stats = RegistryStats::default();
        stats.by_status.insert(ConnectionStatus::Error, 2);
        stats.by_type.insert(ConnectionType::SocketPeer, 1);
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["byStatus"]["error"], 2);
        assert_eq!(value["byType"]["socket-peer"], 1);
    }
}
