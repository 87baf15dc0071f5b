//! Ports to the external server registry and tool catalog, plus in-memory
//! adapters for the CLI and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::error::McpError;
use super::types::{ServerEndpoint, ServerId, ToolDescriptor};

/// Catalog of discovered tools, keyed by server.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Replaces every tool of `server_id` with `tools` in one step. Readers
    /// observe either the previous set or the new one, never a mix.
    async fn replace_tools(&self, server_id: &ServerId, tools: Vec<ToolDescriptor>)
        -> Result<(), McpError>;

    /// Current tools of `server_id`; empty when never discovered.
    async fn tools_for(&self, server_id: &ServerId) -> Result<Vec<ToolDescriptor>, McpError>;
}

/// Resolves server handles supplied by callers.
#[async_trait]
pub trait ServerDirectory: Send + Sync {
    async fn find_server(&self, server_id: &ServerId) -> Result<Option<ServerEndpoint>, McpError>;
}

/// Thread-safe in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<HashMap<ServerId, Arc<Vec<ToolDescriptor>>>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_count(&self) -> usize {
        self.state.read().map(|s| s.len()).unwrap_or(0)
    }
}

fn poisoned(err: impl std::fmt::Display) -> McpError {
    McpError::Store {
        reason: err.to_string(),
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn replace_tools(
        &self,
        server_id: &ServerId,
        tools: Vec<ToolDescriptor>,
    ) -> Result<(), McpError> {
        let tools = Arc::new(tools);
        let mut state = self.state.write().map_err(poisoned)?;
        state.insert(server_id.clone(), tools);
        Ok(())
    }

    async fn tools_for(&self, server_id: &ServerId) -> Result<Vec<ToolDescriptor>, McpError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .get(server_id)
            .map(|tools| tools.as_ref().clone())
            .unwrap_or_default())
    }
}

/// Server directory backed by a fixed map, built from configuration.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServerDirectory {
    servers: Arc<RwLock<HashMap<ServerId, ServerEndpoint>>>,
}

impl InMemoryServerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, server: ServerEndpoint) -> Result<(), McpError> {
        let mut servers = self.servers.write().map_err(poisoned)?;
        servers.insert(server.id.clone(), server);
        Ok(())
    }

    /// Registered servers, sorted by id.
    pub fn list(&self) -> Result<Vec<ServerEndpoint>, McpError> {
        let servers = self.servers.read().map_err(poisoned)?;
        let mut list: Vec<ServerEndpoint> = servers.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }
}

impl FromIterator<ServerEndpoint> for InMemoryServerDirectory {
    fn from_iter<I: IntoIterator<Item = ServerEndpoint>>(iter: I) -> Self {
        let servers = iter.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self {
            servers: Arc::new(RwLock::new(servers)),
        }
    }
}

#[async_trait]
impl ServerDirectory for InMemoryServerDirectory {
    async fn find_server(&self, server_id: &ServerId) -> Result<Option<ServerEndpoint>, McpError> {
        let servers = self.servers.read().map_err(poisoned)?;
        Ok(servers.get(server_id).cloned())
    }
}
