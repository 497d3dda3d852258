use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use chatbox_types::events::GatewayEvent;

/// One live socket. `username` is whatever the client sent in `join` and is
/// never trusted for authorization.
struct ConnectionEntry {
    username: Option<String>,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

/// Owns the set of connected sockets and fans events out to them.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// conn_id -> connection
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns (conn_id, receiver); the caller drains
    /// the receiver into its socket.
    pub async fn connect(&self) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .await
            .insert(conn_id, ConnectionEntry { username: None, tx });
        (conn_id, rx)
    }

    /// Remove a connection. Unknown ids are ignored.
    pub async fn disconnect(&self, conn_id: Uuid) -> Option<String> {
        self.inner
            .connections
            .write()
            .await
            .remove(&conn_id)
            .and_then(|entry| entry.username)
    }

    /// Attach a client-supplied display name to a connection.
    pub async fn tag(&self, conn_id: Uuid, username: String) {
        if let Some(entry) = self.inner.connections.write().await.get_mut(&conn_id) {
            entry.username = Some(username);
        }
    }

    /// Push an event to every registered connection, the originator included.
    ///
    /// Queues are unbounded so one stalled socket cannot hold up the rest.
    /// Connections whose receiver is gone are dropped from the set. Returns
    /// how many connections the event was queued for.
    pub async fn broadcast(&self, event: GatewayEvent) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;

        {
            let connections = self.inner.connections.read().await;
            for (conn_id, entry) in connections.iter() {
                if entry.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*conn_id);
                }
            }
        }

        if !dead.is_empty() {
            let mut connections = self.inner.connections.write().await;
            for conn_id in &dead {
                connections.remove(conn_id);
            }
            debug!("Pruned {} closed connections", dead.len());
        }

        debug!("Broadcast {} to {} connections", event.name(), delivered);
        delivered
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}
