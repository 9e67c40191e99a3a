//! The Room Router: which connections are watching which group.
//!
//! Purely transport-level bookkeeping. Room membership grants nothing by
//! itself — whether a user may join a group's room is checked at the REST
//! layer before the client is ever told to join. The router trusts its
//! caller.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::ws::types::ConnectionId;

#[derive(Debug, Default)]
pub struct RoomRouter {
    rooms: DashMap<String, HashSet<ConnectionId>>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a connection to a group's room. Idempotent.
    pub fn join(&self, group_id: &str, conn_id: ConnectionId) {
        self.rooms
            .entry(group_id.to_string())
            .or_default()
            .insert(conn_id);
    }

    /// Unsubscribes. Leaving a room the connection never joined is a no-op.
    /// Empty rooms are dropped so the map doesn't accumulate dead keys.
    pub fn leave(&self, group_id: &str, conn_id: ConnectionId) {
        let emptied = if let Some(mut members) = self.rooms.get_mut(group_id) {
            members.remove(&conn_id);
            members.is_empty()
        } else {
            false
        };
        if emptied {
            self.rooms.remove_if(group_id, |_, members| members.is_empty());
        }
    }

    /// Removes a connection from every room it joined. Called on disconnect;
    /// the transport does not do this for us.
    pub fn drop_connection(&self, conn_id: ConnectionId) {
        let mut emptied: Vec<String> = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            entry.value_mut().remove(&conn_id);
            if entry.value().is_empty() {
                emptied.push(entry.key().clone());
            }
        }
        for group_id in emptied {
            self.rooms.remove_if(&group_id, |_, members| members.is_empty());
        }
    }

    /// Snapshot of the connections currently joined to a room.
    pub fn connections_in(&self, group_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(group_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_joined(&self, group_id: &str, conn_id: ConnectionId) -> bool {
        self.rooms
            .get(group_id)
            .map(|members| members.contains(&conn_id))
            .unwrap_or(false)
    }
}
