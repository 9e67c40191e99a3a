//! Connection-level types shared across the realtime layer.

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A unique identifier for a single WebSocket connection. Handle identity
/// (not timestamps) is what guards a stale unregister racing a newer
/// registration for the same user.
pub type ConnectionId = Uuid;

/// The sending half of a connection's outbound queue. A dedicated writer
/// task drains the queue into the socket, so events enqueued here reach the
/// client in emission order.
pub type OutboundSender = mpsc::UnboundedSender<Message>;

/// A live connection as the registry and router see it: an identity plus a
/// way to enqueue outbound frames. Cloning shares the same queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub tx: OutboundSender,
}

impl ConnectionHandle {
    pub fn new(tx: OutboundSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }
}
