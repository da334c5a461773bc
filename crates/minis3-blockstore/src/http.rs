//! HTTP client for storage nodes

use crate::{BlobNodeClient, BlobNodeError, NodeEndpoint, NodeHealth, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Configuration for the storage node HTTP client
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    /// Timeout applied to every individual node call
    pub timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl HttpClientConfig {
    /// Create with a custom per-call timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Blob node client speaking the `minis3-node` HTTP protocol.
///
/// Construct once and share; the inner connection pool is reused across nodes.
#[derive(Clone)]
pub struct HttpBlobNodeClient {
    client: Client,
    config: HttpClientConfig,
}

#[derive(Debug, Deserialize)]
struct HealthPayload {
    status: String,
}

impl HttpBlobNodeClient {
    /// Create a new client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| BlobNodeError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn classify(&self, err: reqwest::Error) -> BlobNodeError {
        BlobNodeError::from_reqwest(err, self.config.timeout.as_millis() as u64)
    }

    async fn status_error(response: reqwest::Response, path: &str) -> BlobNodeError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return BlobNodeError::NotFound(path.to_string());
        }
        let message = response.text().await.unwrap_or_default();
        BlobNodeError::Http {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl BlobNodeClient for HttpBlobNodeClient {
    #[instrument(skip(self, node, data), fields(node = %node.name, size = data.len()))]
    async fn store(&self, node: &NodeEndpoint, path: &str, data: Bytes) -> Result<()> {
        let part = multipart::Part::bytes(data.to_vec())
            .file_name("blob")
            .mime_str("application/octet-stream")
            .map_err(|e| BlobNodeError::Configuration(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("path", path.to_string());

        let response = self
            .client
            .put(node.url("/store"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            let err = Self::status_error(response, path).await;
            warn!(error = %err, "store rejected by node");
            return Err(err);
        }

        debug!("stored blob");
        Ok(())
    }

    #[instrument(skip(self, node), fields(node = %node.name))]
    async fn fetch(&self, node: &NodeEndpoint, path: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(node.url("/fetch"))
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, path).await);
        }

        response.bytes().await.map_err(|e| self.classify(e))
    }

    #[instrument(skip(self, node), fields(node = %node.name))]
    async fn delete(&self, node: &NodeEndpoint, path: &str) -> Result<()> {
        let response = self
            .client
            .delete(node.url("/store"))
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, path).await);
        }

        Ok(())
    }

    async fn health(&self, node: &NodeEndpoint) -> NodeHealth {
        let response = match self.client.get(node.url("/health")).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(node = %node.name, error = %e, "health probe failed");
                return NodeHealth::Down;
            }
        };

        if !response.status().is_success() {
            return NodeHealth::Down;
        }

        match response.json::<HealthPayload>().await {
            Ok(payload) if payload.status.eq_ignore_ascii_case("UP") => NodeHealth::Up,
            _ => NodeHealth::Down,
        }
    }
}
