use async_trait::async_trait;

use super::{Transport, TransportHandle};
use crate::error::TransportError;
use crate::types::ConnectionDescriptor;

/// In-process capabilities are always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

#[async_trait]
impl Transport for LocalTransport {
    async fn establish(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<TransportHandle, TransportError> {
        tracing::debug!(connection = %descriptor.id, endpoint = %descriptor.endpoint, "local connection ready");
        Ok(TransportHandle::Local)
    }
}
