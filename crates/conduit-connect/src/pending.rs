//! Table of outstanding correlated requests.
//!
//! Each entry maps a request id to the sender half of a oneshot channel and a
//! deadline. An entry leaves the table exactly once: when a response with its
//! id arrives, when its deadline is swept, when the caller gives up, or when
//! the link closes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::TransportError;
use crate::protocol::{JsonRpcResponse, RequestId};

#[derive(Debug)]
struct PendingRequest {
    issued_at: Instant,
    deadline: Instant,
    tx: oneshot::Sender<JsonRpcResponse>,
}

/// Outstanding requests keyed by id.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<RequestId, PendingRequest>>,
}

impl PendingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request. Fails if `id` is already pending.
    pub fn register(
        &self,
        id: RequestId,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<JsonRpcResponse>, TransportError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return Err(TransportError::DuplicateRequestId(id.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        entries.insert(
            id,
            PendingRequest {
                issued_at: now,
                deadline: now + timeout,
                tx,
            },
        );
        Ok(rx)
    }

    /// Hand a response to its waiter. Returns false when no entry matches.
    pub fn resolve(&self, response: JsonRpcResponse) -> bool {
        let Some(entry) = self.entries.lock().remove(&response.id) else {
            return false;
        };
        // The waiter may have given up between removal and send.
        let _ = entry.tx.send(response);
        true
    }

    /// Drop an entry without resolving it.
    pub fn discard(&self, id: &RequestId) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Remove every entry whose deadline is at or before `now`.
    pub fn expire(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|id, entry| {
            let live = entry.deadline > now;
            if !live {
                tracing::debug!(
                    request_id = %id,
                    age_ms = now.saturating_duration_since(entry.issued_at).as_millis() as u64,
                    "pending request expired"
                );
            }
            live
        });
        before - entries.len()
    }

    /// Remove every entry; waiters observe a closed channel.
    pub fn fail_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Whether `id` is pending.
    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(id: &str) -> JsonRpcResponse {
        JsonRpcResponse::success(id.into(), json!({"ok": true}))
    }

    #[tokio::test]
    async fn test_resolve_matching_id() {
        let table = PendingTable::new();
        let rx_a = table.register("a".into(), Duration::from_secs(10)).unwrap();
        let _rx_b = table.register("b".into(), Duration::from_secs(10)).unwrap();

        assert!(table.resolve(response("a")));
        let got = rx_a.await.unwrap();
        assert_eq!(got.id, RequestId::from("a"));
        assert!(!table.contains(&"a".into()));
        assert!(table.contains(&"b".into()));
    }

    #[test]
    fn test_unknown_id_ignored() {
        let table = PendingTable::new();
        let _rx = table.register("a".into(), Duration::from_secs(10)).unwrap();
        assert!(!table.resolve(response("zzz")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let table = PendingTable::new();
        let _rx = table.register("a".into(), Duration::from_secs(10)).unwrap();
        let err = table.register("a".into(), Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, TransportError::DuplicateRequestId(ref id) if id == "a"));
    }

    #[tokio::test]
    async fn test_expire_sweeps_past_deadline() {
        let table = PendingTable::new();
        let rx = table.register("old".into(), Duration::from_millis(10)).unwrap();
        let _keep = table.register("new".into(), Duration::from_secs(60)).unwrap();

        let swept = table.expire(Instant::now() + Duration::from_secs(1));
        assert_eq!(swept, 1);
        assert!(rx.await.is_err());
        assert!(!table.resolve(response("old")));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_all() {
        let table = PendingTable::new();
        let rx = table.register("a".into(), Duration::from_secs(10)).unwrap();
        assert_eq!(table.fail_all(), 1);
        assert!(table.is_empty());
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_discard() {
        let table = PendingTable::new();
        let _rx = table.register("a".into(), Duration::from_secs(10)).unwrap();
        assert!(table.discard(&"a".into()));
        assert!(!table.discard(&"a".into()));
    }
}
