use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use crate::ws::protocol;

/// Ping interval: server sends a WebSocket ping every 30 seconds to catch
/// connections that died without a close frame.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if no pong arrives within 10 seconds after a ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an accepted WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming frames, dispatches to protocol handlers
///
/// The mpsc channel allows any part of the system to push events to this
/// client by cloning the sender stored in the connection registry.
pub async fn run_connection(socket: WebSocket, state: AppState, session: Option<String>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Register in the connection registry; the relay resolves the session
    // token (supplied via query parameter, or the connection id itself).
    let (connection_id, session) = state.relay.register(session, tx.clone());

    tracing::info!(
        connection_id = %connection_id,
        session = %session,
        "WebSocket actor started"
    );

    // Spawn writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!(connection_id = %connection_id, "pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket frames
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(&text, &tx, &state, connection_id, &session);
                }
                Message::Binary(_) => {
                    // The protocol is JSON text frames; binary is unexpected
                    tracing::debug!(
                        connection_id = %connection_id,
                        "received binary frame (expected JSON text)"
                    );
                }
                Message::Pong(_) => {
                    // Pong received — notify the ping task
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        connection_id = %connection_id,
                        reason = ?frame,
                        "client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::info!(connection_id = %connection_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // Retire the connection: purges it from every room and its session
    // token from every funnel stage, broadcasting a funnel update when
    // membership actually changed.
    state.relay.retire(connection_id);

    tracing::info!(
        connection_id = %connection_id,
        session = %session,
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from the mpsc channel and forwards them
/// to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
