//! Push-connection registry interface.
//!
//! The notification collaborator (server-sent events, out of scope here)
//! needs a table of live client connections. That table is injected through
//! this trait rather than living in a global so the core stays testable and
//! free of static mutable state.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// An event pushed to one connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Event discriminator, e.g. `"comment.created"`.
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Sender half of a client's delivery channel. The receiving half is owned by
/// the transport layer.
pub type ConnectionHandle = mpsc::UnboundedSender<PushEvent>;

/// Registry of live push connections keyed by client id.
pub trait ConnectionRegistry: Send + Sync {
    /// Register a connection, replacing any previous handle for the client.
    fn register(&self, client_id: Uuid, handle: ConnectionHandle);

    /// Drop a client's connection if present.
    fn unregister(&self, client_id: Uuid);

    /// Deliver an event to one client. Returns false when the client is not
    /// connected or its channel is closed.
    fn send(&self, client_id: Uuid, event: PushEvent) -> bool;
}
