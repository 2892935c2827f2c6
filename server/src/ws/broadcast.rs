//! Fan-out of relayed frames to every connection except the sender.

use axum::extract::ws::Message;
use uuid::Uuid;

use super::ConnectionRegistry;

/// Send `text` verbatim to every registered connection other than `sender`.
///
/// Sends go through each connection's mpsc channel, so no peer's socket I/O
/// runs inside this loop. A peer whose channel is already closed
/// (mid-disconnect) is logged and skipped; delivery to the remaining peers
/// continues.
pub fn broadcast_from(registry: &ConnectionRegistry, sender: Uuid, text: &str) {
    for entry in registry.iter() {
        if *entry.key() == sender {
            continue;
        }
        match entry.value().send(Message::Text(text.into())) {
            Ok(()) => {
                tracing::debug!(from = %sender, to = %entry.key(), "Frame forwarded");
            }
            Err(_) => {
                tracing::debug!(
                    from = %sender,
                    to = %entry.key(),
                    "Peer channel closed mid-broadcast, skipping"
                );
            }
        }
    }
}
