pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push frames to a specific
/// client; the connection's writer task owns the socket sink.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Connection registry: the live set of connected peers, keyed by the
/// server-assigned connection id. Mutation and iteration are individually
/// safe under concurrent access.
pub type ConnectionRegistry = Arc<DashMap<Uuid, ConnectionSender>>;

/// Create a new empty connection registry.
pub fn new_connection_registry() -> ConnectionRegistry {
    Arc::new(DashMap::new())
}

/// Add a connection. Ids are fresh UUIDs, so no existing entry is displaced.
pub fn register(registry: &ConnectionRegistry, id: Uuid, sender: ConnectionSender) {
    registry.insert(id, sender);
    tracing::info!(connection = %id, live = registry.len(), "Client connected");
}

/// Remove a connection. Removing an id that is already gone is a no-op, so
/// every actor exit path can call this unconditionally.
pub fn deregister(registry: &ConnectionRegistry, id: Uuid) {
    registry.remove(&id);
    tracing::info!(connection = %id, live = registry.len(), "Client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> ConnectionSender {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn live_set_is_registered_minus_deregistered() {
        let registry = new_connection_registry();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        register(&registry, a, sender());
        register(&registry, b, sender());
        register(&registry, c, sender());
        deregister(&registry, b);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains_key(&a));
        assert!(!registry.contains_key(&b));
        assert!(registry.contains_key(&c));
    }

    #[test]
    fn deregister_of_non_member_is_noop() {
        let registry = new_connection_registry();
        let a = Uuid::new_v4();

        register(&registry, a, sender());
        deregister(&registry, a);
        deregister(&registry, a);
        deregister(&registry, Uuid::new_v4());

        assert!(registry.is_empty());
    }
}
