//! HTTP client for the Mirakurun REST API.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::endpoint::EndpointConfig;
use crate::error::{Error, Result};
use crate::snapshot::decode_object;

/// Client bound to a single Mirakurun endpoint.
///
/// Cloning is cheap and clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    endpoint: EndpointConfig,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client for `endpoint`.
    ///
    /// Without a `timeout` a request waits for as long as the transport does.
    pub fn new(endpoint: EndpointConfig, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { endpoint, http })
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    /// GET `/api/{namespace}` and return the raw body.
    pub async fn fetch_json(&self, namespace: &str, query: Option<&str>) -> Result<Vec<u8>> {
        let url = self.endpoint.url(namespace, query);
        debug!(url = %url, "Fetching upstream document");

        let transport = |source| Error::Transport {
            url: url.clone(),
            source,
        };

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?;

        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }

    /// Fetch a namespace and decode it into `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, namespace: &str) -> Result<T> {
        let body = self.fetch_json(namespace, None).await?;
        decode_object(&body).map_err(|source| Error::Decode {
            namespace: namespace.to_string(),
            source,
        })
    }
}
