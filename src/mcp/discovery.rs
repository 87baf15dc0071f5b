//! Tool discovery: HTTP first, WebSocket as fallback.

use serde_json::json;
use std::sync::Arc;

use super::cancel::CancelSignal;
use super::catalog::map_tools_result;
use super::error::{McpError, TransportFailure, TransportKind};
use super::http::JsonRpcHttpTransport;
use super::protocol::{JsonRpcMessage, METHOD_TOOLS_LIST};
use super::store::{CatalogStore, ServerDirectory};
use super::types::{ServerEndpoint, ServerId, ToolDescriptor};
use super::websocket::{JsonRpcWebSocketSession, SessionConfig};

/// Discovers a server's tools and replaces its catalog entry.
///
/// A failed discovery leaves the stored catalog untouched; there is no
/// placeholder result.
pub struct DiscoveryCoordinator {
    http: Arc<JsonRpcHttpTransport>,
    session: SessionConfig,
    catalog: Arc<dyn CatalogStore>,
    directory: Option<Arc<dyn ServerDirectory>>,
}

impl DiscoveryCoordinator {
    pub fn new(
        http: Arc<JsonRpcHttpTransport>,
        session: SessionConfig,
        catalog: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            http,
            session,
            catalog,
            directory: None,
        }
    }

    /// Enables [`discover_by_id`](Self::discover_by_id).
    pub fn with_directory(mut self, directory: Arc<dyn ServerDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub async fn discover(&self, server: &ServerEndpoint) -> Result<Vec<ToolDescriptor>, McpError> {
        self.discover_with_cancel(server, &CancelSignal::never()).await
    }

    pub async fn discover_by_id(&self, server_id: &ServerId) -> Result<Vec<ToolDescriptor>, McpError> {
        let server = self.resolve(server_id).await?;
        self.discover(&server).await
    }

    pub async fn discover_with_cancel(
        &self,
        server: &ServerEndpoint,
        cancel: &CancelSignal,
    ) -> Result<Vec<ToolDescriptor>, McpError> {
        let (transport, tools) = self.fetch(server, cancel).await?;

        self.catalog.replace_tools(&server.id, tools.clone()).await?;
        tracing::info!(
            server = %server.id,
            transport = %transport,
            tools = tools.len(),
            "Discovered tools"
        );
        Ok(tools)
    }

    async fn fetch(
        &self,
        server: &ServerEndpoint,
        cancel: &CancelSignal,
    ) -> Result<(TransportKind, Vec<ToolDescriptor>), McpError> {
        let http_error = match self.fetch_http(server, cancel).await {
            Ok(tools) => return Ok((TransportKind::Http, tools)),
            Err(e @ McpError::Cancelled { .. }) => return Err(e),
            Err(e) => e,
        };
        tracing::warn!(
            server = %server.id,
            "HTTP discovery failed, falling back to WebSocket: {}",
            http_error
        );

        match self.fetch_websocket(server, cancel).await {
            Ok(tools) => Ok((TransportKind::WebSocket, tools)),
            Err(e @ McpError::Cancelled { .. }) => Err(e),
            Err(ws_error) => Err(McpError::Discovery {
                server_id: server.id.to_string(),
                attempts: vec![
                    TransportFailure::new(TransportKind::Http, http_error),
                    TransportFailure::new(TransportKind::WebSocket, ws_error),
                ],
            }),
        }
    }

    async fn fetch_http(
        &self,
        server: &ServerEndpoint,
        cancel: &CancelSignal,
    ) -> Result<Vec<ToolDescriptor>, McpError> {
        let request = JsonRpcMessage::tools_list(self.http.next_id());
        let result = self.http.call(&server.base_url, &request, cancel).await?;
        map_tools_result(&server.id, &result)
    }

    async fn fetch_websocket(
        &self,
        server: &ServerEndpoint,
        cancel: &CancelSignal,
    ) -> Result<Vec<ToolDescriptor>, McpError> {
        let result =
            JsonRpcWebSocketSession::run(server, &self.session, METHOD_TOOLS_LIST, json!({}), cancel)
                .await?;
        map_tools_result(&server.id, &result)
    }

    async fn resolve(&self, server_id: &ServerId) -> Result<ServerEndpoint, McpError> {
        let not_found = || McpError::ServerNotFound {
            server_id: server_id.to_string(),
        };
        let directory = self.directory.as_ref().ok_or_else(not_found)?;
        directory.find_server(server_id).await?.ok_or_else(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::http::HttpTransportConfig;
    use crate::mcp::retry::RetryConfig;
    use crate::mcp::store::{InMemoryCatalog, InMemoryServerDirectory};
    use crate::mcp::types::AuthType;
    use std::time::Duration;

    fn unreachable_server() -> ServerEndpoint {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        ServerEndpoint::new("down", &format!("http://{}", addr), AuthType::None).unwrap()
    }

    fn coordinator(catalog: Arc<InMemoryCatalog>) -> DiscoveryCoordinator {
        let http = JsonRpcHttpTransport::new(HttpTransportConfig {
            request_timeout: Duration::from_secs(2),
            retry: RetryConfig::none(),
        })
        .unwrap();
        DiscoveryCoordinator::new(Arc::new(http), SessionConfig::default(), catalog)
    }

    #[tokio::test]
    async fn test_total_failure_wraps_both_transports_and_keeps_catalog() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let server = unreachable_server();
        let previous = crate::mcp::catalog::map_tools(&server.id, &[json!({"name": "old"})]);
        catalog.replace_tools(&server.id, previous.clone()).await.unwrap();

        let err = coordinator(catalog.clone()).discover(&server).await.unwrap_err();

        let kinds: Vec<TransportKind> = err.attempts().iter().map(|a| a.transport).collect();
        assert_eq!(kinds, vec![TransportKind::Http, TransportKind::WebSocket]);
        assert_eq!(catalog.tools_for(&server.id).await.unwrap(), previous);
    }

    #[tokio::test]
    async fn test_unknown_server_id() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let directory = Arc::new(InMemoryServerDirectory::new());
        let coordinator = coordinator(catalog).with_directory(directory);

        let err = coordinator
            .discover_by_id(&ServerId::from("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ServerNotFound { .. }));
    }
}
