//! HTTP seam for the completion client.

use crate::error::CompletionError;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use std::pin::Pin;
use std::time::Duration;

/// Response body as a stream of raw chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, CompletionError>> + Send>>;

/// One POST to the completions endpoint.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub api_key: Option<String>,
    /// Serialized JSON body
    pub body: String,
    pub timeout: Duration,
}

/// Status line plus a lazily read body.
pub struct TransportResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`, possibly empty
    pub status_text: String,
    pub body: BodyStream,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reads the whole body.
    pub async fn into_bytes(self) -> Result<Vec<u8>, CompletionError> {
        let mut body = self.body;
        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes)
    }

    /// Reads the whole body as (lossy) UTF-8.
    pub async fn into_text(self) -> Result<String, CompletionError> {
        let bytes = self.into_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Sends completion requests.
///
/// Failures before a status line arrives are reported as
/// [`CompletionError::Timeout`] or [`CompletionError::Network`].
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, CompletionError>;
}

/// `reqwest`-backed transport.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl CompletionTransport for ReqwestTransport {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, CompletionError> {
        let mut builder = self
            .client
            .post(&request.url)
            .header("content-type", "application/json")
            .timeout(request.timeout)
            .body(request.body);
        if let Some(key) = request.api_key.as_deref() {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(map_reqwest_error));

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body: Box::pin(body),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout
    } else if err.is_body() || err.is_decode() {
        CompletionError::Stream(err.to_string())
    } else {
        CompletionError::Network(err.to_string())
    }
}
