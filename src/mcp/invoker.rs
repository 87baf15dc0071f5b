//! Tool invocation: `tools/call` over HTTP, with one WebSocket fallback.

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use super::cancel::{self, CancelHandle, CancelSignal};
use super::error::{McpError, TransportFailure, TransportKind};
use super::http::JsonRpcHttpTransport;
use super::protocol::{JsonRpcMessage, METHOD_TOOLS_CALL};
use super::store::ServerDirectory;
use super::types::{ServerEndpoint, ServerId};
use super::websocket::{JsonRpcWebSocketSession, SessionConfig};

/// Calls tools on remote servers.
///
/// The tool name is sent exactly as given; qualification such as
/// `scope.name` is the caller's decision.
pub struct ToolInvoker {
    http: Arc<JsonRpcHttpTransport>,
    session: SessionConfig,
    /// Appended to the server base URL for HTTP invocations.
    invoke_path: String,
    directory: Option<Arc<dyn ServerDirectory>>,
}

impl ToolInvoker {
    pub fn new(http: Arc<JsonRpcHttpTransport>, session: SessionConfig, invoke_path: &str) -> Self {
        Self {
            http,
            session,
            invoke_path: invoke_path.to_string(),
            directory: None,
        }
    }

    /// Enables [`call_by_id`](Self::call_by_id).
    pub fn with_directory(mut self, directory: Arc<dyn ServerDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Returns the tool's `result` as raw JSON text.
    pub async fn call(
        &self,
        server: &ServerEndpoint,
        tool_name: &str,
        args_json: &str,
    ) -> Result<String, McpError> {
        self.call_with_cancel(server, tool_name, args_json, &CancelSignal::never())
            .await
    }

    pub async fn call_by_id(
        &self,
        server_id: &ServerId,
        tool_name: &str,
        args_json: &str,
    ) -> Result<String, McpError> {
        let not_found = || McpError::ServerNotFound {
            server_id: server_id.to_string(),
        };
        let directory = self.directory.as_ref().ok_or_else(not_found)?;
        let server = directory.find_server(server_id).await?.ok_or_else(not_found)?;
        self.call(&server, tool_name, args_json).await
    }

    pub async fn call_with_cancel(
        &self,
        server: &ServerEndpoint,
        tool_name: &str,
        args_json: &str,
        cancel: &CancelSignal,
    ) -> Result<String, McpError> {
        let arguments = parse_arguments(tool_name, args_json)?;

        let http_error = match self.call_http(server, tool_name, &arguments, cancel).await {
            Ok(result) => return Ok(finish(server, tool_name, TransportKind::Http, result)),
            Err(e @ McpError::Cancelled { .. }) => return Err(e),
            Err(e) => e,
        };

        // The server answered; running the call again elsewhere would duplicate it.
        if http_error.server_error().is_some() {
            return Err(McpError::Invocation {
                tool: tool_name.to_string(),
                attempts: vec![TransportFailure::new(TransportKind::Http, http_error)],
            });
        }
        tracing::warn!(
            server = %server.id,
            tool = tool_name,
            "HTTP invocation failed, falling back to WebSocket: {}",
            http_error
        );

        let params = json!({ "name": tool_name, "arguments": arguments });
        match JsonRpcWebSocketSession::run(server, &self.session, METHOD_TOOLS_CALL, params, cancel)
            .await
        {
            Ok(result) => Ok(finish(server, tool_name, TransportKind::WebSocket, result)),
            Err(e @ McpError::Cancelled { .. }) => Err(e),
            Err(ws_error) => Err(McpError::Invocation {
                tool: tool_name.to_string(),
                attempts: vec![
                    TransportFailure::new(TransportKind::Http, http_error),
                    TransportFailure::new(TransportKind::WebSocket, ws_error),
                ],
            }),
        }
    }

    /// Runs a call as an owned task. The returned handle reports how the call
    /// ended; dropping it unfinished cancels the call.
    pub fn spawn_call(
        self: &Arc<Self>,
        server: ServerEndpoint,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
    ) -> InvocationHandle {
        let id = Uuid::new_v4();
        let tool_name = tool_name.into();
        let args_json = args_json.into();
        let (cancel, signal) = cancel::pair();
        let invoker = Arc::clone(self);

        let span = tracing::info_span!("invocation", id = %id, server = %server.id, tool = %tool_name);
        let task = tokio::spawn(
            async move {
                invoker
                    .call_with_cancel(&server, &tool_name, &args_json, &signal)
                    .await
            }
            .instrument(span),
        );

        InvocationHandle {
            id,
            cancel: Arc::new(cancel),
            task: Some(task),
        }
    }

    async fn call_http(
        &self,
        server: &ServerEndpoint,
        tool_name: &str,
        arguments: &Value,
        cancel: &CancelSignal,
    ) -> Result<Value, McpError> {
        let url = server.join_path(&self.invoke_path);
        let request = JsonRpcMessage::tools_call(self.http.next_id(), tool_name, arguments.clone());
        self.http.call(&url, &request, cancel).await
    }
}

fn finish(server: &ServerEndpoint, tool_name: &str, transport: TransportKind, result: Value) -> String {
    tracing::info!(server = %server.id, tool = tool_name, transport = %transport, "Tool call completed");
    result.to_string()
}

/// Parses caller-supplied arguments. Blank input and `null` mean no arguments.
pub fn parse_arguments(tool_name: &str, args_json: &str) -> Result<Value, McpError> {
    let invalid = |reason: String| McpError::InvalidArguments {
        tool: tool_name.to_string(),
        reason,
    };

    if args_json.trim().is_empty() {
        return Ok(json!({}));
    }
    match serde_json::from_str::<Value>(args_json) {
        Ok(Value::Null) => Ok(json!({})),
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(invalid(format!("expected a JSON object, got {}", kind_of(&other)))),
        Err(e) => Err(invalid(e.to_string())),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// How a spawned invocation ended.
#[derive(Debug)]
pub enum InvocationOutcome {
    Completed(Result<String, McpError>),
    Cancelled,
    Panicked(String),
}

/// Owner's side of a spawned invocation.
#[derive(Debug)]
pub struct InvocationHandle {
    id: Uuid,
    cancel: Arc<CancelHandle>,
    task: Option<JoinHandle<Result<String, McpError>>>,
}

impl InvocationHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Requests cancellation; an open WebSocket session is closed first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancellation trigger that outlives [`join`](Self::join).
    pub fn canceller(&self) -> Arc<CancelHandle> {
        Arc::clone(&self.cancel)
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub async fn join(mut self) -> InvocationOutcome {
        let Some(task) = self.task.take() else {
            return InvocationOutcome::Cancelled;
        };
        let outcome = match task.await {
            Ok(Err(McpError::Cancelled { .. })) => InvocationOutcome::Cancelled,
            Ok(result) => InvocationOutcome::Completed(result),
            Err(e) if e.is_cancelled() => InvocationOutcome::Cancelled,
            Err(e) => InvocationOutcome::Panicked(e.to_string()),
        };
        tracing::debug!(id = %self.id, outcome = ?outcome, "Invocation finished");
        outcome
    }
}

impl Drop for InvocationHandle {
    fn drop(&mut self) {
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::warn!(id = %self.id, "Invocation handle dropped before completion, cancelling");
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::http::HttpTransportConfig;
    use crate::mcp::retry::RetryConfig;
    use crate::mcp::store::InMemoryServerDirectory;
    use crate::mcp::types::AuthType;
    use std::time::Duration;

    fn invoker() -> ToolInvoker {
        let http = JsonRpcHttpTransport::new(HttpTransportConfig {
            request_timeout: Duration::from_secs(2),
            retry: RetryConfig::none(),
        })
        .unwrap();
        ToolInvoker::new(Arc::new(http), SessionConfig::default(), "/tools/call")
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments("t", "").unwrap(), json!({}));
        assert_eq!(parse_arguments("t", "null").unwrap(), json!({}));
        assert_eq!(parse_arguments("t", r#"{"q":"x"}"#).unwrap(), json!({"q": "x"}));

        let err = parse_arguments("t", "[1]").unwrap_err();
        assert!(err.to_string().contains("an array"));
        assert!(matches!(
            parse_arguments("t", "{oops").unwrap_err(),
            McpError::InvalidArguments { .. }
        ));
    }

    #[tokio::test]
    async fn test_bad_arguments_fail_before_any_network_call() {
        let server = ServerEndpoint::new("kb", "http://127.0.0.1:9", AuthType::None).unwrap();
        let err = invoker().call(&server, "search", "42").await.unwrap_err();
        assert!(matches!(err, McpError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_call_by_unknown_id() {
        let invoker = invoker().with_directory(Arc::new(InMemoryServerDirectory::new()));
        let err = invoker
            .call_by_id(&ServerId::from("nope"), "search", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ServerNotFound { .. }));
    }

    #[tokio::test]
    async fn test_spawned_call_reports_completion() {
        let invoker = Arc::new(invoker());
        let server = ServerEndpoint::new("kb", "http://127.0.0.1:9", AuthType::None).unwrap();

        let handle = invoker.spawn_call(server, "search", "not json");
        match handle.join().await {
            InvocationOutcome::Completed(Err(McpError::InvalidArguments { tool, .. })) => {
                assert_eq!(tool, "search")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
