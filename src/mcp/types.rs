//! Domain types shared by discovery and invocation.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

use super::error::McpError;

/// Scope assigned to tools whose server declares none.
pub const GLOBAL_SCOPE: &str = "global";

/// Opaque handle of a server in the external registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// How the server expects callers to authenticate. Carried, not interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    Bearer,
    ApiKey,
}

/// A remote MCP server as seen by one discovery or invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub id: ServerId,
    pub base_url: Url,
    pub auth_type: AuthType,
}

impl ServerEndpoint {
    pub fn new(id: impl Into<String>, base_url: &str, auth_type: AuthType) -> Result<Self, McpError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| McpError::transport(base_url, format!("invalid base URL: {}", e)))?;
        match base_url.scheme() {
            "http" | "https" => Ok(Self {
                id: ServerId::new(id),
                base_url,
                auth_type,
            }),
            other => Err(McpError::transport(
                base_url.as_str(),
                format!("unsupported scheme '{}'", other),
            )),
        }
    }

    /// WebSocket URL for this server: `http→ws`, `https→wss`, with `suffix`
    /// appended to the base path.
    pub fn websocket_url(&self, suffix: &str) -> Result<Url, McpError> {
        let scheme = match self.base_url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(McpError::transport(
                    self.base_url.as_str(),
                    format!("cannot derive a WebSocket URL from scheme '{}'", other),
                ))
            }
        };
        let mut url = self.join_path(suffix);
        url.set_scheme(scheme).map_err(|_| {
            McpError::transport(self.base_url.as_str(), "cannot switch to a WebSocket scheme")
        })?;
        Ok(url)
    }

    /// Base URL with `suffix` appended to its path. An empty suffix yields the
    /// base URL unchanged.
    pub fn join_path(&self, suffix: &str) -> Url {
        let suffix = suffix.trim_start_matches('/');
        let mut url = self.base_url.clone();
        if suffix.is_empty() {
            return url;
        }
        let path = format!("{}/{}", self.base_url.path().trim_end_matches('/'), suffix);
        url.set_path(&path);
        url
    }
}

/// Canonical, locally-held description of a remote tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Assigned locally from `(server_id, name)`; not part of the protocol.
    pub id: Uuid,
    pub server_id: ServerId,
    pub name: String,
    pub description: Option<String>,
    pub scope: String,
    pub input_schema: Option<serde_json::Value>,
}

impl ToolDescriptor {
    /// `scope.name` when `qualified` and the tool is not global, else `name`.
    pub fn wire_name(&self, qualified: bool) -> String {
        if qualified && self.scope != GLOBAL_SCOPE {
            format!("{}.{}", self.scope, self.name)
        } else {
            self.name.clone()
        }
    }
}
