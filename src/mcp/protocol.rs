//! MCP JSON-RPC 2.0 protocol definitions
//!
//! Every message on either transport is one of four shapes. Parsing goes through
//! [`JsonRpcMessage::from_value`] so that HTTP bodies and WebSocket frames are
//! classified by the same rules.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use super::error::McpError;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// Methods
pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

// Error codes
pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Id used by the `initialize` request of every WebSocket handshake.
pub const HANDSHAKE_ID: RequestId = RequestId::Number(1);

/// JSON-RPC request id.
///
/// The wire shape is part of the identity: `1` and `"1"` are different ids, and
/// a reply only correlates with a request when both value and shape match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    /// Reads an id from its wire form. `null`, fractional numbers and other
    /// shapes yield `None`; such messages can never correlate with a request.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RequestId::Number),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestId::Number(n) => Value::from(*n),
            RequestId::String(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// One JSON-RPC 2.0 message.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// Successful reply. Some HTTP servers omit the id entirely.
    Response {
        id: Option<RequestId>,
        result: Value,
    },
    /// Error reply; the id is `null` when the server could not read the request.
    ErrorResponse {
        id: Option<RequestId>,
        error: RpcError,
    },
}

impl JsonRpcMessage {
    pub fn request(id: impl Into<RequestId>, method: &str, params: Value) -> Self {
        JsonRpcMessage::Request {
            id: id.into(),
            method: method.to_string(),
            params: Some(params),
        }
    }

    pub fn notification(method: &str, params: Value) -> Self {
        JsonRpcMessage::Notification {
            method: method.to_string(),
            params: Some(params),
        }
    }

    /// The `initialize` request that opens a WebSocket handshake.
    pub fn initialize(client: &ClientInfo) -> Self {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: client.clone(),
        };
        Self::request(HANDSHAKE_ID, METHOD_INITIALIZE, json!(params))
    }

    pub fn initialized() -> Self {
        Self::notification(METHOD_INITIALIZED, json!({}))
    }

    pub fn tools_list(id: impl Into<RequestId>) -> Self {
        Self::request(id, METHOD_TOOLS_LIST, json!({}))
    }

    pub fn tools_call(id: impl Into<RequestId>, name: &str, arguments: Value) -> Self {
        Self::request(
            id,
            METHOD_TOOLS_CALL,
            json!({ "name": name, "arguments": arguments }),
        )
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request { id, .. } => Some(id),
            JsonRpcMessage::Notification { .. } => None,
            JsonRpcMessage::Response { id, .. } | JsonRpcMessage::ErrorResponse { id, .. } => {
                id.as_ref()
            }
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request { method, .. }
            | JsonRpcMessage::Notification { method, .. } => Some(method.as_str()),
            _ => None,
        }
    }

    /// True for messages a server sends on its own initiative.
    pub fn is_unsolicited(&self) -> bool {
        self.method().is_some()
    }

    /// Turns a reply into its result, surfacing a server error object as
    /// [`McpError::Protocol`] with the server's code and message.
    pub fn into_result(self) -> Result<Value, McpError> {
        match self {
            JsonRpcMessage::Response { result, .. } => Ok(result),
            JsonRpcMessage::ErrorResponse { error, .. } => Err(McpError::from(error)),
            other => Err(McpError::protocol(format!(
                "expected a reply, got {}",
                other.method().unwrap_or("message")
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("jsonrpc".into(), Value::from(JSONRPC_VERSION));
        match self {
            JsonRpcMessage::Request { id, method, params } => {
                obj.insert("id".into(), id.to_value());
                obj.insert("method".into(), Value::from(method.as_str()));
                if let Some(params) = params {
                    obj.insert("params".into(), params.clone());
                }
            }
            JsonRpcMessage::Notification { method, params } => {
                obj.insert("method".into(), Value::from(method.as_str()));
                if let Some(params) = params {
                    obj.insert("params".into(), params.clone());
                }
            }
            JsonRpcMessage::Response { id, result } => {
                obj.insert("id".into(), id.as_ref().map_or(Value::Null, RequestId::to_value));
                obj.insert("result".into(), result.clone());
            }
            JsonRpcMessage::ErrorResponse { id, error } => {
                obj.insert("id".into(), id.as_ref().map_or(Value::Null, RequestId::to_value));
                obj.insert("error".into(), json!(error));
            }
        }
        Value::Object(obj)
    }

    /// Wire text of this message.
    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }

    pub fn parse(text: &str) -> Result<Self, McpError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| McpError::protocol(format!("invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Classifies a decoded JSON value.
    ///
    /// The `jsonrpc` member is not enforced; several servers omit it.
    pub fn from_value(value: Value) -> Result<Self, McpError> {
        let Value::Object(mut obj) = value else {
            return Err(McpError::protocol("JSON-RPC message is not an object"));
        };

        let id = obj.get("id").and_then(RequestId::from_value);

        if let Some(method) = obj.get("method").and_then(Value::as_str).map(str::to_string) {
            let params = obj.remove("params");
            return Ok(match id {
                Some(id) => JsonRpcMessage::Request { id, method, params },
                None => JsonRpcMessage::Notification { method, params },
            });
        }

        match obj.remove("error") {
            Some(Value::Null) | None => {}
            Some(error) => {
                let error: RpcError = serde_json::from_value(error)
                    .map_err(|e| McpError::protocol(format!("malformed error object: {}", e)))?;
                return Ok(JsonRpcMessage::ErrorResponse { id, error });
            }
        }

        match obj.remove("result") {
            Some(result) => Ok(JsonRpcMessage::Response { id, result }),
            None => Err(McpError::protocol(
                "message has neither method, result nor error",
            )),
        }
    }
}

/// Client capabilities declared in `initialize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCapabilities {
    pub tools: Value,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self { tools: json!({}) }
    }
}

/// Client info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Initialize request params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

/// MCP server info
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Initialize result. Only read for logging, so every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(default, rename = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}
