//! WebSocket connection handling (§4.11): per-connection read limit,
//! ping/pong liveness, and write timeout, wired through a
//! [`ConnectionRegistry`].

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use common::Symbol;

use crate::message::{ClientFrame, ServerFrame};
use crate::registry::ConnectionRegistry;

/// Maximum inbound frame size accepted from a client (§4.11: "read
/// limit 512 KiB").
pub const READ_LIMIT_BYTES: usize = 512 * 1024;
/// How long the server waits for a pong before considering the
/// connection dead.
pub const PONG_TIMEOUT: Duration = Duration::from_secs(60);
/// How often the server sends an unsolicited ping.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);
/// How long a single outbound write may take before the connection is
/// dropped.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state handed to every connection's handler.
#[derive(Clone)]
pub struct WsState {
    /// Connection/subscription registry.
    pub registry: Arc<ConnectionRegistry>,
}

/// Axum handler: upgrades the HTTP request and spawns the connection
/// loop.
pub async fn handle_upgrade(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.max_message_size(READ_LIMIT_BYTES).on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (id, mut outbound_rx) = state.registry.register();
    let (mut sink, mut stream) = socket.split();

    let welcome = serde_json::to_string(&ServerFrame::Welcome { connection_id: id }).unwrap_or_default();
    if sink.send(Message::Text(welcome)).await.is_err() {
        state.registry.deregister(id);
        return;
    }

    let mut last_pong = tokio::time::Instant::now();
    let mut ping_ticker = tokio::time::interval(PING_INTERVAL);

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if send_frame(&mut sink, &frame).await.is_err() {
                    break;
                }
            }
            _ = ping_ticker.tick() => {
                if last_pong.elapsed() > PONG_TIMEOUT {
                    warn!(connection_id = id, "pong timeout, closing connection");
                    break;
                }
                if tokio::time::timeout(WRITE_TIMEOUT, sink.send(Message::Ping(Vec::new()))).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_text(&text, id, &state, &mut sink).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = tokio::time::Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(connection_id = id, error = %err, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    info!(connection_id = id, "websocket connection closed");
    state.registry.deregister(id);
}

async fn handle_client_text(
    text: &str,
    connection_id: u64,
    state: &WsState,
    sink: &mut (impl futures_util::Sink<Message, Error = axum::Error> + Unpin),
) {
    let reply = match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Subscribe { symbol }) => {
            state.registry.subscribe(connection_id, Symbol(symbol));
            ServerFrame::Success { request: "subscribe" }
        }
        Ok(ClientFrame::Unsubscribe { symbol }) => {
            state.registry.unsubscribe(connection_id, Symbol(symbol));
            ServerFrame::Success { request: "unsubscribe" }
        }
        Ok(ClientFrame::Quote { .. }) => ServerFrame::Success { request: "quote" },
        Ok(ClientFrame::Ping) => ServerFrame::Pong,
        Err(err) => ServerFrame::Error { request: "unknown", reason: err.to_string() },
    };
    let _ = send_frame(sink, &reply).await;
}

async fn send_frame(
    sink: &mut (impl futures_util::Sink<Message, Error = axum::Error> + Unpin),
    frame: &ServerFrame,
) -> Result<(), ()> {
    let text = serde_json::to_string(frame).unwrap_or_default();
    match tokio::time::timeout(WRITE_TIMEOUT, sink.send(Message::Text(text))).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}
