use async_trait::async_trait;

use super::{Transport, TransportHandle};
use crate::error::TransportError;
use crate::types::ConnectionDescriptor;

/// Placeholder adapter for database connections.
///
/// Establishment reports success without dialing the endpoint. Persisted
/// descriptors depend on that, so a real driver must keep the contract of
/// succeeding for endpoints it cannot reach yet.
// TODO: dial the endpoint once a database driver is chosen for tool routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseTransport;

#[async_trait]
impl Transport for DatabaseTransport {
    async fn establish(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<TransportHandle, TransportError> {
        tracing::warn!(
            connection = %descriptor.id,
            "database transport is a placeholder; marking connected without dialing"
        );
        Ok(TransportHandle::Database)
    }
}
