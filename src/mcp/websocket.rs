//! JSON-RPC over a per-operation WebSocket session.
//!
//! A session lives for exactly one discovery or invocation:
//!
//! ```text
//! Connecting -> Handshaking -> Ready -> AwaitingReply -> Ready -> Closing -> Closed
//!      \              \           \            \                      \
//!       +-> Failed     +-----------+------------+-> Closing            +-> Failed
//! ```
//!
//! Continuation frames are reassembled by tungstenite before a message reaches
//! the session, so classification always sees one complete text message.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::cancel::CancelSignal;
use super::error::McpError;
use super::protocol::{ClientInfo, InitializeResult, JsonRpcMessage, RequestId, HANDSHAKE_ID};
use super::types::ServerEndpoint;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    Ready,
    AwaitingReply,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    /// The transition table. Anything not listed is rejected.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Handshaking)
                | (Connecting, Failed)
                | (Handshaking, Ready)
                | (Handshaking, Closing)
                | (Ready, AwaitingReply)
                | (Ready, Closing)
                | (AwaitingReply, Ready)
                | (AwaitingReply, Closing)
                | (Closing, Closed)
                | (Closing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub client: ClientInfo,
    /// Path appended to the server base URL.
    pub ws_path: String,
    pub connect_timeout: Duration,
    /// Overall budget for one correlated reply.
    pub reply_timeout: Duration,
    pub close_timeout: Duration,
    /// Send `notifications/initialized` after a successful `initialize`.
    pub send_initialized: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client: ClientInfo::default(),
            ws_path: "/ws".to_string(),
            connect_timeout: Duration::from_secs(30),
            reply_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(2),
            send_initialized: true,
        }
    }
}

/// How an inbound message relates to the request being awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The awaited reply.
    Reply,
    /// Notification or server-initiated request.
    Unsolicited,
    /// Late reply to a request this session already saw answered.
    Stale(RequestId),
    /// Reply to something this session never asked, or with no usable id.
    Foreign(Option<RequestId>),
}

/// Classifies `message` while waiting for `expected`.
pub fn classify(message: &JsonRpcMessage, expected: &RequestId, answered: &[RequestId]) -> Inbound {
    if message.is_unsolicited() {
        return Inbound::Unsolicited;
    }
    match message.id() {
        Some(id) if id == expected => Inbound::Reply,
        Some(id) if answered.contains(id) => Inbound::Stale(id.clone()),
        other => Inbound::Foreign(other.cloned()),
    }
}

/// Id of a frame that is JSON but not a well-formed message, when it looks
/// like a reply. A malformed reply still answers the request it names.
fn reply_id(text: &str) -> Option<RequestId> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value.get("method").is_some() {
        return None;
    }
    value.get("id").and_then(RequestId::from_value)
}

pub struct JsonRpcWebSocketSession {
    url: Url,
    state: SessionState,
    stream: Option<WsStream>,
    config: SessionConfig,
    cancel: CancelSignal,
    next_id: i64,
    answered: Vec<RequestId>,
}

impl JsonRpcWebSocketSession {
    /// Runs `method` over a fresh session: connect, handshake, request, close.
    ///
    /// The session is closed on every path before this returns.
    pub async fn run(
        server: &ServerEndpoint,
        config: &SessionConfig,
        method: &str,
        params: Value,
        cancel: &CancelSignal,
    ) -> Result<Value, McpError> {
        let url = server.websocket_url(&config.ws_path)?;
        let mut session = Self::connect(url, config.clone(), cancel.clone()).await?;

        let outcome = match session.handshake().await {
            Ok(_) => session.request(method, params).await,
            Err(e) => Err(e),
        };
        session.close(outcome.is_ok()).await;
        outcome
    }

    /// Opens the connection. On failure the session ends in `Failed` and is
    /// never handed out.
    pub async fn connect(
        url: Url,
        config: SessionConfig,
        cancel: CancelSignal,
    ) -> Result<Self, McpError> {
        let mut session = Self {
            url,
            state: SessionState::Connecting,
            stream: None,
            config,
            cancel,
            next_id: 2,
            answered: Vec::new(),
        };
        tracing::debug!(url = %session.url, "Opening WebSocket session");

        let budget = session.config.connect_timeout;
        let mut cancel = session.cancel.clone();
        let connected = tokio::select! {
            result = timeout(budget, connect_async(session.url.as_str())) => result,
            _ = cancel.cancelled() => {
                session.transition(SessionState::Failed)?;
                return Err(McpError::cancelled("WebSocket connect"));
            }
        };

        match connected {
            Ok(Ok((stream, _response))) => {
                session.stream = Some(stream);
                session.transition(SessionState::Handshaking)?;
                Ok(session)
            }
            Ok(Err(e)) => {
                session.transition(SessionState::Failed)?;
                Err(McpError::transport(session.url.as_str(), e))
            }
            Err(_) => {
                session.transition(SessionState::Failed)?;
                Err(McpError::timeout("WebSocket connect", budget))
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `initialize`, wait for its reply, then the optional `initialized`
    /// notification. The notification is never acknowledged.
    pub async fn handshake(&mut self) -> Result<InitializeResult, McpError> {
        self.expect_state(SessionState::Handshaking)?;

        self.send(&JsonRpcMessage::initialize(&self.config.client)).await?;
        let reply = self.receive_reply(&HANDSHAKE_ID, "initialize").await?;
        self.answered.push(HANDSHAKE_ID);
        let result = reply.into_result()?;

        let info: InitializeResult = serde_json::from_value(result).unwrap_or_default();
        if let Some(server) = &info.server_info {
            tracing::debug!(
                server = %server.name,
                version = %server.version,
                protocol = info.protocol_version.as_deref().unwrap_or("?"),
                "WebSocket handshake complete"
            );
        }

        if self.config.send_initialized {
            self.send(&JsonRpcMessage::initialized()).await?;
        }
        self.transition(SessionState::Ready)?;
        Ok(info)
    }

    /// Sends one request and waits for its correlated reply.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value, McpError> {
        self.expect_state(SessionState::Ready)?;

        let id = RequestId::Number(self.next_id);
        self.next_id += 1;

        self.transition(SessionState::AwaitingReply)?;
        self.send(&JsonRpcMessage::request(id.clone(), method, params)).await?;
        let reply = self.receive_reply(&id, method).await?;
        self.answered.push(id);
        self.transition(SessionState::Ready)?;

        reply.into_result()
    }

    /// Graceful close. Close failures are logged, never returned.
    pub async fn close(&mut self, succeeded: bool) {
        if self.state.is_terminal() {
            return;
        }
        if let Err(e) = self.transition(SessionState::Closing) {
            tracing::warn!(url = %self.url, "{}", e);
        }

        if let Some(mut stream) = self.stream.take() {
            match timeout(self.config.close_timeout, stream.close(None)).await {
                Ok(Ok(())) => tracing::debug!(url = %self.url, "WebSocket session closed"),
                Ok(Err(tungstenite::Error::ConnectionClosed)) => {}
                Ok(Err(e)) => tracing::warn!(url = %self.url, "WebSocket close failed: {}", e),
                Err(_) => tracing::warn!(url = %self.url, "WebSocket close timed out"),
            }
        }

        let end = if succeeded {
            SessionState::Closed
        } else {
            SessionState::Failed
        };
        if let Err(e) = self.transition(end) {
            tracing::warn!(url = %self.url, "{}", e);
            self.state = SessionState::Failed;
        }
    }

    fn transition(&mut self, next: SessionState) -> Result<(), McpError> {
        if !self.state.can_transition_to(next) {
            return Err(McpError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::trace!(url = %self.url, from = %self.state, to = %next, "Session transition");
        self.state = next;
        Ok(())
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), McpError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(McpError::InvalidTransition {
                from: self.state.to_string(),
                to: format!("{} (required)", expected),
            })
        }
    }

    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), McpError> {
        let url = self.url.clone();
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| McpError::transport(url.as_str(), "session is not connected"))?;
        tracing::debug!(url = %url, method = message.method().unwrap_or(""), "WebSocket send");

        let mut cancel = self.cancel.clone();
        tokio::select! {
            result = stream.send(Message::Text(message.encode())) => {
                result.map_err(|e| McpError::transport(url.as_str(), e))
            }
            _ = cancel.cancelled() => Err(McpError::cancelled("WebSocket send")),
        }
    }

    /// Reads until the reply to `expected` arrives, discarding notifications,
    /// stale and foreign replies, and undecodable frames that do not carry
    /// `expected`. A malformed reply to `expected` ends the wait with a
    /// protocol error. The deadline covers the whole wait, not each frame.
    async fn receive_reply(
        &mut self,
        expected: &RequestId,
        operation: &str,
    ) -> Result<JsonRpcMessage, McpError> {
        let budget = self.config.reply_timeout;
        let deadline = Instant::now() + budget;
        let mut cancel = self.cancel.clone();

        loop {
            let url = self.url.as_str();
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| McpError::transport(url, "session is not connected"))?;

            let frame = tokio::select! {
                next = timeout_at(deadline, stream.next()) => match next {
                    Err(_) => return Err(McpError::timeout(operation, budget)),
                    Ok(None) => return Err(McpError::transport(url, "connection closed by server")),
                    Ok(Some(Err(e))) => return Err(McpError::transport(url, e)),
                    Ok(Some(Ok(frame))) => frame,
                },
                _ = cancel.cancelled() => return Err(McpError::cancelled(operation)),
            };

            let Some(text) = self.frame_text(frame)? else {
                continue;
            };

            let message = match JsonRpcMessage::parse(&text) {
                Ok(message) => message,
                Err(e) if reply_id(&text).as_ref() == Some(expected) => {
                    tracing::warn!(url = %self.url, id = %expected, "Malformed reply: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(url = %self.url, "Discarding undecodable frame: {}", e);
                    continue;
                }
            };

            match classify(&message, expected, &self.answered) {
                Inbound::Reply => return Ok(message),
                Inbound::Unsolicited => tracing::debug!(
                    url = %self.url,
                    method = message.method().unwrap_or(""),
                    "Discarding server notification"
                ),
                Inbound::Stale(id) => tracing::debug!(
                    url = %self.url,
                    id = %id,
                    awaiting = %expected,
                    "Discarding stale reply"
                ),
                Inbound::Foreign(id) => tracing::debug!(
                    url = %self.url,
                    id = ?id,
                    awaiting = %expected,
                    "Discarding reply with unknown id"
                ),
            }
        }
    }

    /// Text payload of a data frame; `None` for control frames.
    fn frame_text(&self, frame: Message) -> Result<Option<String>, McpError> {
        match frame {
            Message::Text(text) => Ok(Some(text)),
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Ok(Some(text)),
                Err(_) => {
                    tracing::warn!(url = %self.url, "Discarding non UTF-8 binary frame");
                    Ok(None)
                }
            },
            Message::Close(frame) => Err(McpError::transport(
                self.url.as_str(),
                match frame {
                    Some(frame) => format!("server closed the session: {} {}", frame.code, frame.reason),
                    None => "server closed the session".to_string(),
                },
            )),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(None),
        }
    }
}

impl Drop for JsonRpcWebSocketSession {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            tracing::warn!(url = %self.url, state = %self.state, "WebSocket session dropped without close");
        }
    }
}
