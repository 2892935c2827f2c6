use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;
use crate::ws::{self, protocol};

/// Run the actor-per-connection pattern for one WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames from an mpsc channel
/// - Reader loop: parses, classifies, and relays incoming frames
///
/// The mpsc channel allows any part of the system to send frames to this
/// client by cloning the sender. Every exit path falls through to
/// deregistration.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let id = Uuid::new_v4();

    ws::register(&state.connections, id, tx.clone());

    // Spawn writer task: forwards mpsc frames to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Reader loop: process incoming WebSocket frames
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(text.as_str(), id, &tx, &state).await;
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        connection = %id,
                        "Ignoring binary frame (protocol is JSON text)"
                    );
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Pong(_) => {}
                Message::Close(frame) => {
                    tracing::info!(
                        connection = %id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection = %id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::info!(connection = %id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort the writer task, then remove this connection from the
    // registry
    writer_handle.abort();
    ws::deregister(&state.connections, id);
}

/// Writer task: receives frames from the mpsc channel and forwards them to
/// the WebSocket sink. One writer per connection, so a stalled peer only
/// delays its own frames.
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
