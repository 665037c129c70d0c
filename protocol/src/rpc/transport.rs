//! The transport seam.
//!
//! Everything above this trait speaks `eth_*` methods and JSON values;
//! everything below it moves bytes. [`HttpTransport`] is the production
//! implementation; [`super::mock::MockTransport`] scripts responses for tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::types::{RpcRequest, RpcResponse};
use crate::error::ClientError;

/// Sends a single JSON-RPC request and returns its `result`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invokes `method` with positional `params`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Rpc`] when the endpoint answers with an error object;
    /// transport-specific variants otherwise.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        (**self).request(method, params).await
    }
}

/// JSON-RPC over HTTP POST.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Creates a transport for `url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Fails only if the TLS backend cannot be initialized.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);

        tracing::debug!(id, method, "json-rpc request");

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body: response.text().await?,
            });
        }

        let body: RpcResponse = response.json().await?;
        let result = body.into_result();
        if let Err(e) = &result {
            tracing::debug!(id, method, error = %e, "json-rpc error");
        }
        result
    }
}
