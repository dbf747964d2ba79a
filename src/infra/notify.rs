//! In-process push-connection table.

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::application::notify::{ConnectionHandle, ConnectionRegistry, PushEvent};

/// [`ConnectionRegistry`] backed by a concurrent map. Closed channels are
/// swept on the next failed send rather than eagerly.
#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    connections: DashMap<Uuid, ConnectionHandle>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }
}

impl ConnectionRegistry for InMemoryConnectionRegistry {
    fn register(&self, client_id: Uuid, handle: ConnectionHandle) {
        if self.connections.insert(client_id, handle).is_some() {
            debug!(%client_id, "Replaced existing push connection");
        }
    }

    fn unregister(&self, client_id: Uuid) {
        self.connections.remove(&client_id);
    }

    fn send(&self, client_id: Uuid, event: PushEvent) -> bool {
        let Some(handle) = self.connections.get(&client_id) else {
            return false;
        };
        if handle.send(event).is_err() {
            drop(handle);
            self.connections.remove(&client_id);
            debug!(%client_id, "Dropped closed push connection");
            return false;
        }
        true
    }
}
