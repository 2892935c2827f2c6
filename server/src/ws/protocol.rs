use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::records::classify::{self, Disposition};
use crate::records::merge;
use crate::state::AppState;
use crate::ws::broadcast;

/// Handle an incoming text frame: parse, classify, merge, relay.
///
/// Non-JSON and non-object frames are logged and dropped without relaying;
/// the connection stays open. Admin queries get the store dump as a direct
/// reply and are never relayed. Everything else is merged into the record
/// store and then forwarded verbatim to all other connections.
pub async fn handle_text_message(
    text: &str,
    sender: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
) {
    tracing::debug!(connection = %sender, len = text.len(), "Received frame");

    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                connection = %sender,
                error = %e,
                "Dropping unparsable frame"
            );
            return;
        }
    };
    if !parsed.is_object() {
        tracing::warn!(connection = %sender, "Dropping non-object frame");
        return;
    }

    let disposition = classify::classify(&parsed);

    match merge::apply(&state.store, &disposition, &parsed).await {
        Ok(outcome) => {
            if let Some(reply) = outcome.reply {
                let _ = tx.send(Message::Text(reply.into()));
            }
            if outcome.mutated {
                if let Disposition::Update { key, .. } = &disposition {
                    tracing::debug!(connection = %sender, user = %key, "Record saved");
                }
            }
        }
        Err(e) => {
            // A failed snapshot write is logged; the frame is still relayed.
            tracing::error!(connection = %sender, error = %e, "Record merge failed");
        }
    }

    // Admin queries are answered directly and never fanned out.
    if disposition == Disposition::Admin {
        return;
    }

    broadcast::broadcast_from(&state.connections, sender, text);
}
