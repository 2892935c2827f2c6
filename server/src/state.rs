use crate::records::store::RecordStore;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Active WebSocket connections
    pub connections: ConnectionRegistry,
    /// Whole-file JSON record store
    pub store: RecordStore,
}
