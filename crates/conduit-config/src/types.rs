//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]       # embedded protocol server
//! [storage]      # where connection descriptors live
//! [timeouts]     # transport and tool-call deadlines
//! [terminal]     # local terminal tool settings
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default listen address of the embedded server.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8765";

/// Default maximum inbound WebSocket message size.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// File name used for persisted connections inside the config dir.
pub const CONNECTIONS_FILE: &str = "connections.json";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial files (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    /// Embedded server settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSection>,
    /// Connection persistence settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSection>,
    /// Deadlines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<TimeoutsSection>,
    /// Terminal tool settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalSection>,
}

impl ConduitConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Config with every tunable section written out at its default.
    ///
    /// `[storage]` stays absent since its only key defaults to a path
    /// relative to the config dir.
    pub fn with_defaults() -> Self {
        Self {
            server: Some(ServerSection::default()),
            storage: None,
            timeouts: Some(TimeoutsSection::default()),
            terminal: Some(TerminalSection::default()),
        }
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Merging is section by section: a section present in `other` replaces
    /// the whole section here.
    pub fn merge(&mut self, other: ConduitConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        if other.timeouts.is_some() {
            self.timeouts = other.timeouts;
        }
        if other.terminal.is_some() {
            self.terminal = other.terminal;
        }
    }

    /// Server section, or defaults.
    pub fn server(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    /// Timeouts section, or defaults.
    pub fn timeouts(&self) -> TimeoutsSection {
        self.timeouts.clone().unwrap_or_default()
    }

    /// Terminal section, or defaults.
    pub fn terminal(&self) -> TerminalSection {
        self.terminal.clone().unwrap_or_default()
    }

    /// Path of the connections file, defaulting into `config_dir`.
    pub fn connections_file(&self, config_dir: &Path) -> PathBuf {
        self.storage
            .as_ref()
            .and_then(|s| s.connections_file.clone())
            .unwrap_or_else(|| config_dir.join(CONNECTIONS_FILE))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Whether `serve` starts the embedded server.
    pub enabled: bool,
    /// Listen address.
    pub bind_address: String,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
    /// Name announced to peers.
    pub name: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            name: "conduit".to_string(),
        }
    }
}

impl ServerSection {
    /// Parsed listen address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind_address
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::invalid_value("server.bind_address", e.to_string())
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────────────────────────

/// `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Connections file; defaults to `connections.json` in the config dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections_file: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Timeouts
// ─────────────────────────────────────────────────────────────────────────────

/// `[timeouts]` section. Values are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    /// Reachability probe of `api` connections.
    pub api_probe_secs: u64,
    /// Handshake deadline for `socket-peer` connections.
    pub peer_connect_secs: u64,
    /// Deadline for a correlated `tools/call`.
    pub tool_call_secs: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            api_probe_secs: 5,
            peer_connect_secs: 5,
            tool_call_secs: 10,
        }
    }
}

impl TimeoutsSection {
    pub fn api_probe(&self) -> Duration {
        Duration::from_secs(self.api_probe_secs)
    }

    pub fn peer_connect(&self) -> Duration {
        Duration::from_secs(self.peer_connect_secs)
    }

    pub fn tool_call(&self) -> Duration {
        Duration::from_secs(self.tool_call_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Terminal
// ─────────────────────────────────────────────────────────────────────────────

/// `[terminal]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSection {
    /// Default command deadline in seconds.
    pub command_timeout_secs: u64,
    /// Default working directory for commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl Default for TerminalSection {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            working_dir: None,
        }
    }
}

impl TerminalSection {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_defaults() {
        let config = ConduitConfig::from_toml("").unwrap();
        assert_eq!(config, ConduitConfig::new());

        let server = config.server();
        assert!(server.enabled);
        assert_eq!(server.bind_addr().unwrap().to_string(), "127.0.0.1:8765");
        assert_eq!(server.max_message_size, 1024 * 1024);
        assert_eq!(config.timeouts().tool_call(), Duration::from_secs(10));
        assert_eq!(config.terminal().command_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let config = ConduitConfig::from_toml(
            r#"
[server]
bind_address = "0.0.0.0:9000"

[timeouts]
tool_call_secs = 2
"#,
        )
        .unwrap();

        let server = config.server();
        assert_eq!(server.bind_address, "0.0.0.0:9000");
        assert_eq!(server.name, "conduit");
        let timeouts = config.timeouts();
        assert_eq!(timeouts.tool_call_secs, 2);
        assert_eq!(timeouts.peer_connect_secs, 5);
    }

    #[test]
    fn test_bad_bind_address() {
        let section = ServerSection {
            bind_address: "not an address".to_string(),
            ..Default::default()
        };
        let err = section.bind_addr().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(err.to_string().contains("server.bind_address"));
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = ConduitConfig::from_toml(
            r#"
[server]
name = "base"

[terminal]
command_timeout_secs = 5
"#,
        )
        .unwrap();
        let overlay = ConduitConfig::from_toml(
            r#"
[server]
enabled = false
"#,
        )
        .unwrap();

        base.merge(overlay);
        let server = base.server();
        assert!(!server.enabled);
        // Whole section replaced, so the name falls back to the default.
        assert_eq!(server.name, "conduit");
        assert_eq!(base.terminal().command_timeout_secs, 5);
    }

    #[test]
    fn test_connections_file_default_and_override() {
        let dir = Path::new("/etc/conduit");
        let config = ConduitConfig::new();
        assert_eq!(
            config.connections_file(dir),
            PathBuf::from("/etc/conduit/connections.json")
        );

        let config = ConduitConfig::from_toml(
            r#"
[storage]
connections_file = "/var/lib/conduit/conns.json"
"#,
        )
        .unwrap();
        assert_eq!(
            config.connections_file(dir),
            PathBuf::from("/var/lib/conduit/conns.json")
        );
    }

    #[test]
    fn test_with_defaults_matches_accessors() {
        let config = ConduitConfig::with_defaults();
        let empty = ConduitConfig::new();
        assert_eq!(config.server(), empty.server());
        assert_eq!(config.timeouts(), empty.timeouts());
        assert_eq!(config.terminal(), empty.terminal());

        let text = config.to_toml().unwrap();
        assert!(text.contains("[server]"));
        assert!(text.contains("[timeouts]"));
        assert!(!text.contains("[storage]"));
        assert_eq!(ConduitConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_to_toml_round_trips_sections() {
        let mut config = ConduitConfig::new();
        config.terminal = Some(TerminalSection {
            command_timeout_secs: 12,
            working_dir: Some(PathBuf::from("/srv")),
        });
        let text = config.to_toml().unwrap();
        assert!(text.contains("[terminal]"));
        assert!(!text.contains("[server]"));
        assert_eq!(ConduitConfig::from_toml(&text).unwrap(), config);
    }
}
