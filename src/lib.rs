//! mcpgate: discovers and invokes tools on remote MCP servers.
//!
//! The two entry points are [`DiscoveryCoordinator::discover`] and
//! [`ToolInvoker::call`]. Both try JSON-RPC over HTTP first and fall back to a
//! WebSocket session with an `initialize` handshake.

pub mod config;
pub mod mcp;

pub use config::Settings;
pub use mcp::{
    DiscoveryCoordinator, McpError, ServerEndpoint, ServerId, ToolDescriptor, ToolInvoker,
};
