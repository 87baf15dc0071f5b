//! MCP (Model Context Protocol) client engine
//!
//! - Discovery: lists a server's tools over HTTP, falling back to WebSocket
//! - Invocation: calls one tool over HTTP, falling back to a fresh WebSocket session
//! - Transports: stateless JSON-RPC over HTTP POST, per-call WebSocket sessions

pub mod cancel;
pub mod catalog;
pub mod discovery;
pub mod error;
pub mod http;
pub mod invoker;
pub mod protocol;
pub mod retry;
pub mod store;
pub mod types;
pub mod websocket;

pub use cancel::{CancelHandle, CancelSignal};
pub use catalog::{map_tools, map_tools_result};
pub use discovery::DiscoveryCoordinator;
pub use error::{McpError, TransportFailure, TransportKind};
pub use http::{HttpTransportConfig, JsonRpcHttpTransport};
pub use invoker::{InvocationHandle, InvocationOutcome, ToolInvoker};
pub use protocol::{ClientInfo, JsonRpcMessage, RequestId, RpcError};
pub use retry::RetryConfig;
pub use store::{CatalogStore, InMemoryCatalog, InMemoryServerDirectory, ServerDirectory};
pub use types::{AuthType, ServerEndpoint, ServerId, ToolDescriptor, GLOBAL_SCOPE};
pub use websocket::{JsonRpcWebSocketSession, SessionConfig, SessionState};
