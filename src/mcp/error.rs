//! MCP client error types.

use std::fmt;
use thiserror::Error;

use super::protocol::{RequestId, RpcError};

/// Which wire transport an attempt used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Http,
    WebSocket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Http => f.write_str("http"),
            TransportKind::WebSocket => f.write_str("websocket"),
        }
    }
}

/// One failed attempt on one transport.
#[derive(Debug)]
pub struct TransportFailure {
    pub transport: TransportKind,
    pub error: McpError,
}

impl TransportFailure {
    pub fn new(transport: TransportKind, error: McpError) -> Self {
        Self { transport, error }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.transport, self.error)
    }
}

fn describe(attempts: &[TransportFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during discovery or invocation.
#[derive(Debug, Error)]
pub enum McpError {
    /// Connection refused, DNS failure, reset, WebSocket upgrade rejected.
    #[error("transport error for '{target}': {reason}")]
    Transport {
        target: String,
        reason: String,
        transient: bool,
    },

    /// The HTTP exchange completed with a non-2xx status.
    #[error("HTTP {status} from '{url}'")]
    HttpStatus { url: String, status: u16 },

    /// Malformed body (no code) or a JSON-RPC error object returned by the server.
    #[error("protocol error: {message}")]
    Protocol {
        code: Option<i64>,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// No correlated reply within the budget.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// A single-shot reply carried someone else's id.
    #[error("reply id {received} does not match request id {expected}")]
    Correlation {
        expected: RequestId,
        received: RequestId,
    },

    #[error("unknown server: '{server_id}'")]
    ServerNotFound { server_id: String },

    /// A session transition outside the table.
    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{operation} cancelled")]
    Cancelled { operation: String },

    #[error("catalog store error: {reason}")]
    Store { reason: String },

    /// Every transport failed to list the server's tools.
    #[error("discovery for server '{server_id}' failed ({})", describe(.attempts))]
    Discovery {
        server_id: String,
        attempts: Vec<TransportFailure>,
    },

    /// The tool call failed on every transport tried.
    #[error("tool call '{tool}' failed ({})", describe(.attempts))]
    Invocation {
        tool: String,
        attempts: Vec<TransportFailure>,
    },
}

impl McpError {
    pub fn transport(target: impl Into<String>, reason: impl fmt::Display) -> Self {
        McpError::Transport {
            target: target.into(),
            reason: reason.to_string(),
            transient: false,
        }
    }

    pub fn transient(target: impl Into<String>, reason: impl fmt::Display) -> Self {
        McpError::Transport {
            target: target.into(),
            reason: reason.to_string(),
            transient: true,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        McpError::Protocol {
            code: None,
            message: message.into(),
            data: None,
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        McpError::Timeout {
            operation: operation.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        McpError::Cancelled {
            operation: operation.into(),
        }
    }

    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            McpError::Transport { transient, .. } => *transient,
            McpError::HttpStatus { status, .. } => *status == 429,
            _ => false,
        }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, McpError::Protocol { .. })
    }

    /// Code and message of a server-supplied JSON-RPC error, looking through
    /// the per-transport attempts of aggregate errors (last attempt first).
    pub fn server_error(&self) -> Option<(i64, &str)> {
        match self {
            McpError::Protocol {
                code: Some(code),
                message,
                ..
            } => Some((*code, message.as_str())),
            McpError::Discovery { attempts, .. } | McpError::Invocation { attempts, .. } => {
                attempts.iter().rev().find_map(|a| a.error.server_error())
            }
            _ => None,
        }
    }

    /// Per-transport failures of an aggregate error.
    pub fn attempts(&self) -> &[TransportFailure] {
        match self {
            McpError::Discovery { attempts, .. } | McpError::Invocation { attempts, .. } => {
                attempts
            }
            _ => &[],
        }
    }
}

impl From<RpcError> for McpError {
    fn from(err: RpcError) -> Self {
        McpError::Protocol {
            code: Some(err.code),
            message: err.message,
            data: err.data,
        }
    }
}
