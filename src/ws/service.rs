//! The realtime service: delivery dispatch, presence broadcast, and
//! block-state notification over the registry and room router.
//!
//! Every operation here is best-effort. Persistence happens at the REST
//! layer before any method on this service is called, so a missed push is
//! recoverable by fetch; a send to a closed queue is logged and dropped.

use axum::extract::ws::{Message, Utf8Bytes};
use tracing::{debug, warn};

use crate::models::{DirectMessage, Group, GroupMessage};
use crate::ws::events::ServerEvent;
use crate::ws::registry::ConnectionRegistry;
use crate::ws::rooms::RoomRouter;
use crate::ws::types::{ConnectionHandle, ConnectionId, OutboundSender};

#[derive(Debug, Default)]
pub struct RealtimeService {
    registry: ConnectionRegistry,
    rooms: RoomRouter,
}

impl RealtimeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomRouter {
        &self.rooms
    }

    // ----- connection lifecycle -----

    /// Accepts a connection. If it carries a user id it also registers
    /// presence (last-write-wins). The full online set is pushed to everyone
    /// afterwards, so even an unregistered connection learns who is online.
    pub fn connect(&self, user_id: Option<&str>, handle: ConnectionHandle) {
        self.registry.attach(&handle);
        match user_id {
            Some(user_id) => {
                self.registry.register(user_id, handle);
                debug!(user_id, "connection registered");
            }
            None => {
                debug!(conn_id = %handle.id, "connection accepted without userId; presence not tracked");
            }
        }
        self.broadcast_presence();
    }

    /// Tears a connection down: leaves every room, detaches from the fan-out
    /// set, and unregisters presence if this connection still owns the
    /// user's registry entry. Presence is rebroadcast only when the online
    /// set actually shrank; a superseded connection going away (or an
    /// untracked one) changes nothing worth announcing.
    pub fn disconnect(&self, user_id: Option<&str>, conn_id: ConnectionId) {
        self.rooms.drop_connection(conn_id);
        self.registry.detach(conn_id);
        let Some(user_id) = user_id else { return };
        if self.registry.unregister(user_id, conn_id) {
            debug!(user_id, "connection unregistered");
            self.broadcast_presence();
        }
    }

    pub fn join_room(&self, group_id: &str, conn_id: ConnectionId) {
        self.rooms.join(group_id, conn_id);
    }

    pub fn leave_room(&self, group_id: &str, conn_id: ConnectionId) {
        self.rooms.leave(group_id, conn_id);
    }

    // ----- presence -----

    /// Pushes the full online-user-id set to every connection.
    pub fn broadcast_presence(&self) {
        self.broadcast_all(&ServerEvent::OnlineUsers(self.registry.online_user_ids()));
    }

    // ----- delivery dispatch -----

    /// Emits `newMessage` to the receiver's connection, if any. An offline
    /// receiver is not an error: the persisted record is authoritative and
    /// shows up in their unseen counts on the next sidebar fetch.
    pub fn dispatch_direct(&self, message: &DirectMessage) {
        match self.registry.sender_for_user(&message.receiver_id) {
            Some(tx) => {
                self.send(&tx, &ServerEvent::NewMessage(message.clone()));
                debug!(receiver_id = %message.receiver_id, "direct message dispatched");
            }
            None => {
                debug!(receiver_id = %message.receiver_id, "receiver offline; no live push");
            }
        }
    }

    /// Emits `groupMessage` to every connection joined to the group's room.
    /// Members who are not currently viewing the conversation get nothing
    /// live and catch up over REST.
    pub fn dispatch_group(&self, message: &GroupMessage) {
        self.send_to_room(&message.group_id, &ServerEvent::GroupMessage(message.clone()));
    }

    // ----- block-state notification -----

    /// Broadcasts `blockStatusChanged` to every connection. Broadcast-and-
    /// filter: each client checks whether it is one of the two parties. This
    /// avoids resolving the blocked party's handle, which may not exist at
    /// all if they are offline.
    pub fn notify_block_change(&self, blocker_id: &str, blocked_id: &str, is_blocked: bool) {
        self.broadcast_all(&ServerEvent::BlockStatusChanged {
            blocker_id: blocker_id.to_string(),
            blocked_id: blocked_id.to_string(),
            is_blocked,
        });
    }

    // ----- group lifecycle notifications -----

    /// New group: everyone learns about it (members render it, others ignore it).
    pub fn announce_group_created(&self, group: &Group) {
        self.broadcast_all(&ServerEvent::GroupCreated(group.clone()));
    }

    /// A user was just added to an existing group; they get `groupCreated`
    /// as if the group were new to them.
    pub fn notify_member_added(&self, user_id: &str, group: &Group) {
        self.send_to_user(user_id, &ServerEvent::GroupCreated(group.clone()));
    }

    /// Rename/image/membership change: connections viewing the room update live.
    pub fn notify_group_updated(&self, group: &Group) {
        self.send_to_room(&group.id, &ServerEvent::GroupUpdated(group.clone()));
    }

    /// Targeted variant, used after a leave so every remaining member's
    /// sidebar refreshes whether or not they have the room open.
    pub fn notify_group_updated_user(&self, user_id: &str, group: &Group) {
        self.send_to_user(user_id, &ServerEvent::GroupUpdated(group.clone()));
    }

    pub fn notify_group_deleted(&self, group_id: &str) {
        self.broadcast_all(&ServerEvent::GroupDeleted {
            group_id: group_id.to_string(),
        });
    }

    // ----- send plumbing -----

    /// Sends an event to a user's registered connection. Returns whether a
    /// connection was found; a missing one is expected, not an error.
    pub fn send_to_user(&self, user_id: &str, event: &ServerEvent) -> bool {
        match self.registry.sender_for_user(user_id) {
            Some(tx) => {
                self.send(&tx, event);
                true
            }
            None => false,
        }
    }

    /// Fans an event out to every connection joined to a room.
    pub fn send_to_room(&self, group_id: &str, event: &ServerEvent) {
        let conn_ids = self.rooms.connections_in(group_id);
        if conn_ids.is_empty() {
            return;
        }
        let Some(frame) = encode(event) else { return };
        debug!(group_id, count = conn_ids.len(), "room fan-out");
        for conn_id in conn_ids {
            if let Some(tx) = self.registry.sender_for(conn_id) {
                if tx.send(frame.clone()).is_err() {
                    warn!(%conn_id, "dropping frame for closed connection");
                }
            }
        }
    }

    /// Fans an event out to every live connection.
    pub fn broadcast_all(&self, event: &ServerEvent) {
        let Some(frame) = encode(event) else { return };
        for tx in self.registry.all_senders() {
            if tx.send(frame.clone()).is_err() {
                warn!("dropping broadcast frame for closed connection");
            }
        }
    }

    fn send(&self, tx: &OutboundSender, event: &ServerEvent) {
        if let Some(frame) = encode(event) {
            if tx.send(frame).is_err() {
                warn!("dropping frame for closed connection");
            }
        }
    }
}

/// Serializes an event once; fan-out clones the frame per connection.
fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(Utf8Bytes::from(json))),
        Err(err) => {
            warn!(error = %err, "failed to serialize server event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::mpsc;

    struct TestClient {
        handle: ConnectionHandle,
        rx: mpsc::UnboundedReceiver<Message>,
    }

    impl TestClient {
        fn connect(service: &RealtimeService, user_id: Option<&str>) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let handle = ConnectionHandle::new(tx);
            service.connect(user_id, handle.clone());
            Self { handle, rx }
        }

        /// Drains queued frames into parsed JSON values.
        fn drain(&mut self) -> Vec<serde_json::Value> {
            let mut frames = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                if let Message::Text(text) = msg {
                    frames.push(serde_json::from_str(&text).unwrap());
                }
            }
            frames
        }

        fn events_named(&mut self, name: &str) -> Vec<serde_json::Value> {
            self.drain()
                .into_iter()
                .filter(|v| v["event"] == name)
                .collect()
        }
    }

    fn direct(sender: &str, receiver: &str) -> DirectMessage {
        DirectMessage {
            id: "m1".into(),
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            text: Some("hello".into()),
            image: None,
            seen: false,
            created_at: Utc::now(),
        }
    }

    fn group_message(sender: &str, group_id: &str) -> GroupMessage {
        GroupMessage {
            id: "gm1".into(),
            sender_id: sender.into(),
            group_id: group_id.into(),
            text: Some("hello".into()),
            image: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn presence_broadcast_reaches_every_connection() {
        let service = RealtimeService::new();
        let mut a = TestClient::connect(&service, Some("a"));
        let mut anon = TestClient::connect(&service, None);
        let mut b = TestClient::connect(&service, Some("b"));

        // B connected last, so everyone's latest presence frame lists a and b.
        for client in [&mut a, &mut anon, &mut b] {
            let frames = client.events_named("getOnlineUsers");
            let last = frames.last().expect("no presence frame");
            let mut ids: Vec<String> = last["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_str().unwrap().to_string())
                .collect();
            ids.sort();
            assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        }
    }

    #[test]
    fn disconnect_updates_presence_for_the_rest() {
        let service = RealtimeService::new();
        let a = TestClient::connect(&service, Some("a"));
        let mut b = TestClient::connect(&service, Some("b"));

        service.disconnect(Some("a"), a.handle.id);

        let frames = b.events_named("getOnlineUsers");
        let last = frames.last().unwrap();
        assert_eq!(last["data"], serde_json::json!(["b"]));
    }

    #[test]
    fn dispatch_direct_targets_only_the_receiver() {
        let service = RealtimeService::new();
        let mut a = TestClient::connect(&service, Some("a"));
        let mut b = TestClient::connect(&service, Some("b"));
        let mut c = TestClient::connect(&service, Some("c"));

        service.dispatch_direct(&direct("a", "b"));

        assert_eq!(b.events_named("newMessage").len(), 1);
        assert!(a.events_named("newMessage").is_empty());
        assert!(c.events_named("newMessage").is_empty());
    }

    #[test]
    fn dispatch_direct_to_offline_receiver_is_silent() {
        let service = RealtimeService::new();
        let mut a = TestClient::connect(&service, Some("a"));

        // Receiver never connected; nothing is emitted anywhere.
        service.dispatch_direct(&direct("a", "ghost"));
        assert!(a.events_named("newMessage").is_empty());
    }

    #[test]
    fn group_dispatch_reaches_exactly_the_joined_connections() {
        let service = RealtimeService::new();
        let mut a = TestClient::connect(&service, Some("a"));
        let mut b = TestClient::connect(&service, Some("b"));
        // C is a group member but never opened the conversation.
        let mut c = TestClient::connect(&service, Some("c"));

        service.join_room("g1", a.handle.id);
        service.join_room("g1", b.handle.id);

        service.dispatch_group(&group_message("a", "g1"));

        assert_eq!(a.events_named("groupMessage").len(), 1);
        assert_eq!(b.events_named("groupMessage").len(), 1);
        assert!(c.events_named("groupMessage").is_empty());
    }

    #[test]
    fn leaving_a_room_stops_delivery() {
        let service = RealtimeService::new();
        let mut a = TestClient::connect(&service, Some("a"));
        let mut b = TestClient::connect(&service, Some("b"));

        service.join_room("g1", a.handle.id);
        service.join_room("g1", b.handle.id);
        service.leave_room("g1", b.handle.id);

        service.dispatch_group(&group_message("a", "g1"));

        assert_eq!(a.events_named("groupMessage").len(), 1);
        assert!(b.events_named("groupMessage").is_empty());
    }

    #[test]
    fn block_change_is_broadcast_to_all_with_the_triple() {
        let service = RealtimeService::new();
        let mut a = TestClient::connect(&service, Some("a"));
        let mut b = TestClient::connect(&service, Some("b"));
        let mut c = TestClient::connect(&service, Some("c"));

        service.notify_block_change("a", "b", true);

        for client in [&mut a, &mut b, &mut c] {
            let frames = client.events_named("blockStatusChanged");
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0]["data"]["blockerId"], "a");
            assert_eq!(frames[0]["data"]["blockedId"], "b");
            assert_eq!(frames[0]["data"]["isBlocked"], true);
        }
    }

    #[test]
    fn reconnect_supersedes_old_connection_for_targeted_sends() {
        let service = RealtimeService::new();
        let mut first = TestClient::connect(&service, Some("u"));
        let mut second = TestClient::connect(&service, Some("u"));

        service.dispatch_direct(&direct("x", "u"));
        assert_eq!(second.events_named("newMessage").len(), 1);
        assert!(first.events_named("newMessage").is_empty());

        // The stale connection's disconnect must not take "u" offline.
        service.disconnect(Some("u"), first.handle.id);
        assert!(service.registry().is_online("u"));

        service.dispatch_direct(&direct("x", "u"));
        assert_eq!(second.events_named("newMessage").len(), 1);
    }

    #[test]
    fn stale_or_untracked_disconnect_does_not_rebroadcast_presence() {
        let service = RealtimeService::new();
        let first = TestClient::connect(&service, Some("u"));
        let second = TestClient::connect(&service, Some("u"));
        let anon = TestClient::connect(&service, None);
        let mut observer = TestClient::connect(&service, Some("o"));
        observer.drain();

        // Neither the superseded connection nor the untracked one changes
        // the online set, so nobody hears about them.
        service.disconnect(Some("u"), first.handle.id);
        service.disconnect(None, anon.handle.id);
        assert!(observer.events_named("getOnlineUsers").is_empty());

        // The live connection going away does.
        service.disconnect(Some("u"), second.handle.id);
        let frames = observer.events_named("getOnlineUsers");
        assert_eq!(frames.last().unwrap()["data"], serde_json::json!(["o"]));
    }

    #[test]
    fn disconnect_leaves_all_rooms() {
        let service = RealtimeService::new();
        let a = TestClient::connect(&service, Some("a"));
        let mut b = TestClient::connect(&service, Some("b"));

        service.join_room("g1", a.handle.id);
        service.join_room("g1", b.handle.id);
        service.disconnect(Some("a"), a.handle.id);

        service.dispatch_group(&group_message("b", "g1"));
        assert_eq!(b.events_named("groupMessage").len(), 1);
        assert!(service.rooms().connections_in("g1").len() == 1);
    }
}
