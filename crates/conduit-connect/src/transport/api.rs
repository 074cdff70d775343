use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{Transport, TransportHandle};
use crate::error::TransportError;
use crate::types::{AuthType, ConnectionDescriptor};

/// Probes an HTTP endpoint with a single authenticated GET.
#[derive(Debug, Clone)]
pub struct ApiTransport {
    client: Client,
    timeout: Duration,
}

impl ApiTransport {
    /// Create an adapter whose probe gives up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }

    fn probe_request(
        &self,
        descriptor: &ConnectionDescriptor,
        url: Url,
    ) -> reqwest::RequestBuilder {
        let request = self.client.get(url).timeout(self.timeout);
        match descriptor.auth_type {
            Some(AuthType::ApiKey) => match &descriptor.api_key {
                Some(key) => request.header("X-API-Key", key.expose()),
                None => request,
            },
            Some(AuthType::Bearer) | Some(AuthType::OAuth) | None => {
                match descriptor.access_token.as_ref().or(descriptor.api_key.as_ref()) {
                    Some(token) => request.bearer_auth(token.expose()),
                    None => request,
                }
            }
        }
    }
}

#[async_trait]
impl Transport for ApiTransport {
    async fn establish(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<TransportHandle, TransportError> {
        let url = Url::parse(&descriptor.endpoint)
            .map_err(|e| TransportError::invalid_endpoint(&descriptor.endpoint, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::invalid_endpoint(
                &descriptor.endpoint,
                "expected an http or https URL",
            ));
        }

        tracing::debug!(connection = %descriptor.id, url = %url, "probing API endpoint");
        let response = self
            .probe_request(descriptor, url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout)
                } else {
                    TransportError::Http(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(TransportHandle::Api)
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}
