//! Single-shot JSON-RPC over HTTP POST.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use url::Url;

use super::cancel::CancelSignal;
use super::error::McpError;
use super::protocol::{JsonRpcMessage, RequestId};
use super::retry::{with_retry, RetryConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct HttpTransportConfig {
    /// Budget for one attempt, connect through body.
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

/// JSON-RPC client transport over HTTP.
///
/// Connections are pooled by the underlying client; each call is an
/// independent POST whose reply is matched against that call's own id.
pub struct JsonRpcHttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
    next_id: AtomicI64,
}

impl JsonRpcHttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, McpError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| McpError::transport("http client", e))?;
        Ok(Self {
            client,
            config,
            next_id: AtomicI64::new(1),
        })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Fresh request id for the next call through this transport.
    pub fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// POSTs `request` and returns the reply's `result`, retrying transient
    /// failures. A JSON-RPC error object becomes [`McpError::Protocol`].
    pub async fn call(
        &self,
        url: &Url,
        request: &JsonRpcMessage,
        cancel: &CancelSignal,
    ) -> Result<Value, McpError> {
        self.send(url, request, cancel).await?.into_result()
    }

    /// POSTs `request` and returns the raw reply message.
    pub async fn send(
        &self,
        url: &Url,
        request: &JsonRpcMessage,
        cancel: &CancelSignal,
    ) -> Result<JsonRpcMessage, McpError> {
        let body = request.to_value();
        let expected = request.id();
        tracing::debug!(
            url = %url,
            method = request.method().unwrap_or(""),
            "Sending JSON-RPC request over HTTP"
        );

        with_retry(&self.config.retry, cancel, |attempt| {
            let body = &body;
            let mut cancel = cancel.clone();
            async move {
                tokio::select! {
                    reply = self.attempt(url, body, expected) => reply,
                    _ = cancel.cancelled() => Err(McpError::cancelled(format!(
                        "HTTP attempt {} to {}",
                        attempt + 1,
                        url
                    ))),
                }
            }
        })
        .await
    }

    async fn attempt(
        &self,
        url: &Url,
        body: &Value,
        expected: Option<&RequestId>,
    ) -> Result<JsonRpcMessage, McpError> {
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(McpError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|e| classify(url, e))?;
        let reply = JsonRpcMessage::parse(&text)?;

        if reply.is_unsolicited() {
            return Err(McpError::protocol(format!(
                "expected a reply from {}, got '{}'",
                url,
                reply.method().unwrap_or_default()
            )));
        }
        if let (Some(expected), Some(received)) = (expected, reply.id()) {
            if expected != received {
                return Err(McpError::Correlation {
                    expected: expected.clone(),
                    received: received.clone(),
                });
            }
        }

        Ok(reply)
    }
}

/// Network-level failures are transient; request-building problems are not.
fn classify(url: &Url, err: reqwest::Error) -> McpError {
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        McpError::transient(url.as_str(), err)
    } else {
        McpError::transport(url.as_str(), err)
    }
}
