//! [`CockpitServer`] – HTTP + WebSocket listener.
//!
//! * `GET /api/state` → the current snapshot as JSON.
//! * WebSocket upgrade on `/ws` → snapshot stream plus command ingress.
//! * Anything else → 404.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use gcs_runtime::OperatorCommands;
use gcs_types::GcsError;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::CockpitConfig;

/// Default TCP port for the cockpit.
pub const DEFAULT_PORT: u16 = 8080;

const PEEK_BYTES: usize = 1024;

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

pub struct CockpitServer {
    commands: OperatorCommands,
    config: CockpitConfig,
}

impl CockpitServer {
    pub fn new(commands: OperatorCommands, config: CockpitConfig) -> Self {
        Self { commands, config }
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Bind `0.0.0.0:<port>` and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// [`GcsError::Transport`] when the listener cannot bind.
    pub async fn run(self) -> Result<(), GcsError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GcsError::Transport(format!("cockpit bind on {addr}: {e}")))?;
        info!(%addr, "cockpit listening");
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections on an already bound listener.
    pub async fn serve(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let commands = self.commands.clone();
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, commands, config).await {
                            debug!(%peer, error = %e, "cockpit client error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "cockpit accept error"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Route {
    StateStream,
    StateQuery,
    NotFound,
}

/// Classify a request from its first bytes.
fn route(head: &str) -> Route {
    let mut request_line = head.lines().next().unwrap_or("").split_whitespace();
    let method = request_line.next().unwrap_or("");
    let path = request_line
        .next()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("");
    let is_upgrade = head.lines().any(|line| {
        let line = line.to_ascii_lowercase();
        line.starts_with("upgrade:") && line.contains("websocket")
    });

    match (method, path, is_upgrade) {
        ("GET", "/ws", true) => Route::StateStream,
        ("GET", "/api/state", false) => Route::StateQuery,
        _ => Route::NotFound,
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    commands: OperatorCommands,
    config: CockpitConfig,
) -> Result<(), GcsError> {
    // `peek` leaves the request in place for the WebSocket handshaker.
    let mut buf = [0u8; PEEK_BYTES];
    let n = stream.peek(&mut buf).await?;
    let head = String::from_utf8_lossy(&buf[..n]);

    match route(&head) {
        Route::StateStream => handle_ws(stream, peer, commands, &config).await,
        Route::StateQuery => {
            stream.read(&mut buf).await?;
            match commands.snapshot().await {
                Ok(body) => respond(&mut stream, "200 OK", &body).await,
                Err(e) => {
                    let body = json!({"ok": false, "error": e.to_string()}).to_string();
                    respond(&mut stream, "503 Service Unavailable", &body).await
                }
            }
        }
        Route::NotFound => {
            stream.read(&mut buf).await?;
            respond(&mut stream, "404 Not Found", r#"{"ok":false,"error":"not found"}"#).await
        }
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<(), GcsError> {
    let response = format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len(),
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// WebSocket: snapshot stream + command ingress
// ---------------------------------------------------------------------------

async fn handle_ws(
    stream: TcpStream,
    peer: SocketAddr,
    commands: OperatorCommands,
    config: &CockpitConfig,
) -> Result<(), GcsError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| GcsError::Transport(format!("WS handshake from {peer}: {e}")))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let mut snapshots = commands.subscribe(config.sink_capacity, config.keepalive());
    info!(%peer, "cockpit client connected");

    let initial = commands.snapshot().await?;
    if ws_tx.send(Message::Text(initial.into())).await.is_err() {
        return Ok(());
    }

    loop {
        tokio::select! {
            // ── Downstream: store → browser ────────────────────────────────
            snapshot = snapshots.next() => {
                let Ok(snapshot) = snapshot else { break };
                if ws_tx.send(Message::Text(snapshot.to_string().into())).await.is_err() {
                    break;
                }
            }
            // ── Upstream: browser → operator commands ──────────────────────
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_upstream_message(text.as_str(), &commands)
                            && ws_tx.send(Message::Text(reply.to_string().into())).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    info!(%peer, "cockpit client disconnected");
    Ok(())
}

// ---------------------------------------------------------------------------
// Upstream message parser
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum UpstreamOp {
    CmdMode { mode: i64 },
    Estop { active: bool },
}

/// Apply one upstream message and build its reply.
///
/// | Message | Effect |
/// |---|---|
/// | `{"op":"cmd_mode","mode":n}` | [`OperatorCommands::set_commanded_mode`] |
/// | `{"op":"estop","active":b}` | [`OperatorCommands::set_estop`] |
///
/// Text that is not JSON, or JSON without a known `op`, is ignored.
pub(crate) fn handle_upstream_message(text: &str, commands: &OperatorCommands) -> Option<Value> {
    let Ok(op) = serde_json::from_str::<UpstreamOp>(text) else {
        debug!(len = text.len(), "ignoring unrecognised upstream message");
        return None;
    };

    let reply = match op {
        UpstreamOp::CmdMode { mode } => match commands.set_commanded_mode(mode) {
            Ok(()) => json!({"ok": true, "mode": mode}),
            Err(e) => json!({"ok": false, "error": e.to_string()}),
        },
        UpstreamOp::Estop { active } => match commands.set_estop(active) {
            Ok(()) => json!({"ok": true, "active": active}),
            Err(e) => json!({"ok": false, "error": e.to_string()}),
        },
    };
    Some(reply)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
