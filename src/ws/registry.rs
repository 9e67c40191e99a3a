//! The Connection Registry: who is online, and on which connection.
//!
//! Two maps: every live connection by id (the broadcast fan-out set), and the
//! user-to-connection association (presence and targeted delivery). One
//! connection per user — registering again overwrites the old association,
//! and an unregister only wins if it still holds the registered handle.

use dashmap::DashMap;

use crate::ws::types::{ConnectionHandle, ConnectionId, OutboundSender};

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Every live connection, registered for presence or not.
    connections: DashMap<ConnectionId, OutboundSender>,
    /// The authenticated association. Last-registered wins per user.
    users: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to the fan-out set. Called for every accepted
    /// socket, including ones that never register a user id.
    pub fn attach(&self, handle: &ConnectionHandle) {
        self.connections.insert(handle.id, handle.tx.clone());
    }

    /// Removes a connection from the fan-out set on disconnect.
    pub fn detach(&self, conn_id: ConnectionId) {
        self.connections.remove(&conn_id);
    }

    /// Associates `user_id` with `handle`, overwriting any prior association
    /// for that user (single-connection-per-user policy).
    pub fn register(&self, user_id: &str, handle: ConnectionHandle) {
        self.users.insert(user_id.to_string(), handle);
    }

    /// Removes the association only if `conn_id` is still the registered
    /// handle. A stale unregister racing a newer registration is a no-op,
    /// as is unregistering a user with no entry.
    ///
    /// Returns whether the registry changed.
    pub fn unregister(&self, user_id: &str, conn_id: ConnectionId) -> bool {
        self.users
            .remove_if(user_id, |_, handle| handle.id == conn_id)
            .is_some()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn online_user_ids(&self) -> Vec<String> {
        self.users.iter().map(|entry| entry.key().clone()).collect()
    }

    /// The registered connection's outbound queue for a user, if online.
    pub fn sender_for_user(&self, user_id: &str) -> Option<OutboundSender> {
        self.users.get(user_id).map(|entry| entry.tx.clone())
    }

    pub fn sender_for(&self, conn_id: ConnectionId) -> Option<OutboundSender> {
        self.connections.get(&conn_id).map(|entry| entry.value().clone())
    }

    /// Snapshot of every connection's outbound queue, for broadcast-to-all.
    pub fn all_senders(&self) -> Vec<OutboundSender> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    #[test]
    fn online_set_tracks_register_unregister_history() {
        let registry = ConnectionRegistry::new();
        let (ha, _rxa) = handle();
        let (hb, _rxb) = handle();

        registry.register("a", ha.clone());
        registry.register("b", hb.clone());
        let mut online = registry.online_user_ids();
        online.sort();
        assert_eq!(online, vec!["a".to_string(), "b".to_string()]);

        assert!(registry.unregister("a", ha.id));
        assert_eq!(registry.online_user_ids(), vec!["b".to_string()]);
        assert!(!registry.is_online("a"));
        assert!(registry.is_online("b"));
    }

    #[test]
    fn register_is_last_write_wins() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = handle();
        let (c2, _rx2) = handle();

        registry.register("u", c1.clone());
        registry.register("u", c2.clone());

        // Only C2 is associated now.
        let current = registry.sender_for_user("u").unwrap();
        assert!(current.same_channel(&c2.tx));
        assert!(!current.same_channel(&c1.tx));
    }

    #[test]
    fn stale_unregister_is_a_noop() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = handle();
        let (c2, _rx2) = handle();

        registry.register("u", c1.clone());
        registry.register("u", c2.clone());

        // C1's disconnect arrives after C2 took over; it must not evict C2.
        assert!(!registry.unregister("u", c1.id));
        assert!(registry.is_online("u"));

        assert!(registry.unregister("u", c2.id));
        assert!(!registry.is_online("u"));
    }

    #[test]
    fn unregister_unknown_user_is_a_noop() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = handle();
        assert!(!registry.unregister("ghost", c1.id));
    }

    #[test]
    fn attach_detach_controls_broadcast_set() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = handle();
        let (c2, _rx2) = handle();

        registry.attach(&c1);
        registry.attach(&c2);
        assert_eq!(registry.all_senders().len(), 2);

        registry.detach(c1.id);
        assert_eq!(registry.all_senders().len(), 1);
        assert!(registry.sender_for(c1.id).is_none());
        assert!(registry.sender_for(c2.id).is_some());
    }
}
