// ============================================
// MCPGATE - Loopback MCP Server for Tests
// ============================================
//
// Serves plain HTTP JSON-RPC and WebSocket sessions on one port, the way a
// real MCP server exposes `base_url` and `base_url/ws`. Connections that no
// handler accepts are dropped, which the client sees as a failed transport.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use mcpgate::mcp::{
    AuthType, HttpTransportConfig, JsonRpcHttpTransport, RetryConfig, ServerEndpoint,
    SessionConfig,
};

type HttpHandler = Arc<dyn Fn(usize, &str, &Value) -> (u16, String) + Send + Sync>;
type WsHandler = Arc<dyn Fn(&Value) -> Vec<String> + Send + Sync>;

/// What the server saw.
#[derive(Default)]
pub struct Recorded {
    pub http_requests: AtomicUsize,
    pub http_paths: Mutex<Vec<String>>,
    pub http_bodies: Mutex<Vec<Value>>,
    pub ws_sessions: AtomicUsize,
    pub ws_closes: AtomicUsize,
    pub ws_messages: Mutex<Vec<Value>>,
}

impl Recorded {
    pub fn http_count(&self) -> usize {
        self.http_requests.load(Ordering::SeqCst)
    }

    pub fn ws_session_count(&self) -> usize {
        self.ws_sessions.load(Ordering::SeqCst)
    }

    pub fn ws_close_count(&self) -> usize {
        self.ws_closes.load(Ordering::SeqCst)
    }

    pub fn ws_methods(&self) -> Vec<String> {
        self.ws_messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m["method"].as_str().unwrap_or("").to_string())
            .collect()
    }
}

pub struct MockServer {
    pub base_url: String,
    pub recorded: Arc<Recorded>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    pub fn endpoint(&self, id: &str) -> ServerEndpoint {
        ServerEndpoint::new(id, &self.base_url, AuthType::None).unwrap()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Default)]
pub struct MockServerBuilder {
    http: Option<HttpHandler>,
    ws: Option<WsHandler>,
}

impl MockServerBuilder {
    /// Handler receives the request index, path and JSON body.
    pub fn http(
        mut self,
        handler: impl Fn(usize, &str, &Value) -> (u16, Value) + Send + Sync + 'static,
    ) -> Self {
        self.http = Some(Arc::new(move |index: usize, path: &str, body: &Value| {
            let (status, reply) = handler(index, path, body);
            (status, reply.to_string())
        }));
        self
    }

    /// Like [`http`](Self::http), but the body is sent as given.
    pub fn http_text(
        mut self,
        handler: impl Fn(usize, &str, &Value) -> (u16, String) + Send + Sync + 'static,
    ) -> Self {
        self.http = Some(Arc::new(handler));
        self
    }

    /// Handler receives each decoded text frame and returns the frames to send back.
    pub fn websocket(
        mut self,
        handler: impl Fn(&Value) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.ws = Some(Arc::new(handler));
        self
    }

    pub async fn start(self) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Recorded::default());

        let state = Arc::clone(&recorded);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let http = self.http.clone();
                let ws = self.ws.clone();
                let recorded = Arc::clone(&state);
                tokio::spawn(serve(stream, http, ws, recorded));
            }
        });

        MockServer {
            base_url: format!("http://{}", addr),
            recorded,
            task,
        }
    }
}

async fn serve(
    stream: TcpStream,
    http: Option<HttpHandler>,
    ws: Option<WsHandler>,
    recorded: Arc<Recorded>,
) {
    let Some(head) = peek_head(&stream).await else {
        return;
    };
    if head.to_ascii_lowercase().contains("upgrade: websocket") {
        if let Some(ws) = ws {
            serve_websocket(stream, ws, recorded).await;
        }
    } else if let Some(http) = http {
        let _ = serve_http(stream, http, recorded).await;
    }
}

async fn peek_head(stream: &TcpStream) -> Option<String> {
    let mut buf = vec![0u8; 16 * 1024];
    for _ in 0..400 {
        let n = stream.peek(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        let text = String::from_utf8_lossy(&buf[..n]);
        if text.contains("\r\n\r\n") {
            return Some(text.into_owned());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

async fn serve_http(
    mut stream: TcpStream,
    handler: HttpHandler,
    recorded: Arc<Recorded>,
) -> std::io::Result<()> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < header_end + length {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    let end = (header_end + length).min(data.len());
    let body: Value = serde_json::from_slice(&data[header_end..end]).unwrap_or(Value::Null);

    let index = recorded.http_requests.fetch_add(1, Ordering::SeqCst);
    recorded.http_paths.lock().unwrap().push(path.clone());
    recorded.http_bodies.lock().unwrap().push(body.clone());

    let (status, payload) = handler(index, &path, &body);
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        payload.len(),
        payload
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

async fn serve_websocket(stream: TcpStream, handler: WsHandler, recorded: Arc<Recorded>) {
    let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    recorded.ws_sessions.fetch_add(1, Ordering::SeqCst);

    while let Some(Ok(message)) = socket.next().await {
        match message {
            Message::Text(text) => {
                let request: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                recorded.ws_messages.lock().unwrap().push(request.clone());
                for frame in handler(&request) {
                    if socket.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                }
            }
            Message::Close(_) => {
                recorded.ws_closes.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

// --- replies ---

pub fn reply(request: &Value, result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }).to_string()
}

pub fn reply_to(id: Value, result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string()
}

pub fn error_reply(request: &Value, code: i64, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "error": { "code": code, "message": message }
    })
    .to_string()
}

pub fn notification(method: &str) -> String {
    json!({ "jsonrpc": "2.0", "method": method, "params": {} }).to_string()
}

/// WebSocket handler that completes the `initialize` handshake, ignores
/// notifications, and passes every other request to `f`.
pub fn mcp_session(
    f: impl Fn(&str, &Value) -> Vec<String> + Send + Sync + 'static,
) -> impl Fn(&Value) -> Vec<String> + Send + Sync + 'static {
    move |request: &Value| {
        if request.get("id").is_none() {
            return Vec::new();
        }
        let method = request["method"].as_str().unwrap_or("");
        if method == "initialize" {
            return vec![reply(
                request,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "mock", "version": "1.0.0" }
                }),
            )];
        }
        f(method, request)
    }
}

// --- client side ---

pub fn http_transport(retry: RetryConfig) -> Arc<JsonRpcHttpTransport> {
    Arc::new(
        JsonRpcHttpTransport::new(HttpTransportConfig {
            request_timeout: Duration::from_secs(5),
            retry,
        })
        .unwrap(),
    )
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        connect_timeout: Duration::from_secs(5),
        reply_timeout: Duration::from_secs(5),
        ..SessionConfig::default()
    }
}

/// Polls `check` for up to two seconds.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
