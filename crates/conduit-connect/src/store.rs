//! Persistence port for connection descriptors.
//!
//! The registry snapshots its descriptors through a [`ConnectionStore`] after
//! every add, remove and update. Runtime state (status, handles, timestamps)
//! is never persisted.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ConnectError, Result};
use crate::types::ConnectionDescriptor;

/// Loads and saves connection descriptors.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Load every stored descriptor.
    async fn load_connections(&self) -> Result<Vec<ConnectionDescriptor>>;

    /// Replace the stored set with `connections`.
    async fn save_connections(&self, connections: &[ConnectionDescriptor]) -> Result<()>;
}

/// Stores descriptors as a pretty-printed JSON array in one file.
///
/// Writes go to a sibling temp file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConnectionStore for JsonFileStore {
    async fn load_connections(&self) -> Result<Vec<ConnectionDescriptor>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no connections file yet");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(ConnectError::storage(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            ConnectError::storage(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    async fn save_connections(&self, connections: &[ConnectionDescriptor]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ConnectError::storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(connections)
            .map_err(|e| ConnectError::storage(format!("failed to serialize connections: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            ConnectError::storage(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            ConnectError::storage(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        tracing::debug!(path = %self.path.display(), count = connections.len(), "saved connections");
        Ok(())
    }
}

/// In-memory store for tests and ephemeral registries.
#[derive(Debug, Default)]
pub struct MemoryStore {
    connections: Mutex<Vec<ConnectionDescriptor>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `connections`.
    pub fn with_connections(connections: Vec<ConnectionDescriptor>) -> Self {
        Self {
            connections: Mutex::new(connections),
            saves: Mutex::new(0),
        }
    }

    /// Current stored set.
    pub fn snapshot(&self) -> Vec<ConnectionDescriptor> {
        self.connections.lock().clone()
    }

    /// Number of saves performed.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn load_connections(&self) -> Result<Vec<ConnectionDescriptor>> {
        Ok(self.snapshot())
    }

    async fn save_connections(&self, connections: &[ConnectionDescriptor]) -> Result<()> {
        *self.connections.lock() = connections.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionType;
    use tempfile::TempDir;

    fn sample() -> Vec<ConnectionDescriptor> {
        vec![
            ConnectionDescriptor::new("Files", ConnectionType::Local, "filesystem").with_id("fs"),
            ConnectionDescriptor::new("GitHub", ConnectionType::Api, "https://api.github.com")
                .with_id("github")
                .with_category("development")
                .with_bearer_token("ghp_x"),
        ]
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("connections.json"));
        assert!(store.load_connections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/connections.json"));

        store.save_connections(&sample()).await.unwrap();
        assert!(store.path().exists());
        assert!(!dir.path().join("nested/connections.json.tmp").exists());

        let loaded = store.load_connections().await.unwrap();
        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("connections.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileStore::new(path).load_connections().await.unwrap_err();
        assert!(matches!(err, ConnectError::Storage(_)));
    }

    #[tokio::test]
    async fn test_memory_store_counts_saves() {
        let store = MemoryStore::new();
        store.save_connections(&sample()).await.unwrap();
        store.save_connections(&sample()[..1]).await.unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load_connections().await.unwrap().len(), 1);
    }
}
