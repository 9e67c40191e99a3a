//! The socket protocol: tagged JSON envelopes in both directions.
//!
//! Every frame is `{"event": <name>, "data": <payload>}`. Server-to-client
//! and client-to-server events are separate enums so each side's dispatch is
//! a single typed `match` rather than dynamically-registered callbacks.

use serde::{Deserialize, Serialize};

use crate::models::{DirectMessage, Group, GroupMessage};

/// Events pushed from the server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// The full online-user-id set; sent to every connection whenever the
    /// registry changes.
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers(Vec<String>),

    /// A direct message, sent to the receiver's connection only.
    #[serde(rename = "newMessage")]
    NewMessage(DirectMessage),

    /// A group message, sent to every connection joined to the group's room.
    #[serde(rename = "groupMessage")]
    GroupMessage(GroupMessage),

    /// A new group (broadcast on creation) or an existing group the target
    /// user was just added to (targeted send).
    #[serde(rename = "groupCreated")]
    GroupCreated(Group),

    /// Rename, re-image, or membership change.
    #[serde(rename = "groupUpdated")]
    GroupUpdated(Group),

    /// The group is gone; clients drop it from their lists.
    #[serde(rename = "groupDeleted")]
    #[serde(rename_all = "camelCase")]
    GroupDeleted { group_id: String },

    /// A block/unblock happened. Broadcast to everyone; each client filters
    /// locally and only the two parties update their flags.
    #[serde(rename = "blockStatusChanged")]
    #[serde(rename_all = "camelCase")]
    BlockStatusChanged {
        blocker_id: String,
        blocked_id: String,
        is_blocked: bool,
    },

    /// Sent back on an unparseable client frame.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Events the client sends over the socket. Everything else the client does
/// goes through REST.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Client opened a group conversation; payload is the group id.
    #[serde(rename = "joinGroup")]
    JoinGroup(String),

    /// Client closed a group conversation or left the group.
    #[serde(rename = "leaveGroup")]
    LeaveGroup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_users_wire_shape() {
        let event = ServerEvent::OnlineUsers(vec!["u1".into(), "u2".into()]);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "getOnlineUsers");
        assert_eq!(value["data"], serde_json::json!(["u1", "u2"]));
    }

    #[test]
    fn block_status_changed_wire_shape() {
        let event = ServerEvent::BlockStatusChanged {
            blocker_id: "a".into(),
            blocked_id: "b".into(),
            is_blocked: true,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "blockStatusChanged");
        assert_eq!(value["data"]["blockerId"], "a");
        assert_eq!(value["data"]["blockedId"], "b");
        assert_eq!(value["data"]["isBlocked"], true);
    }

    #[test]
    fn client_events_parse_from_envelope() {
        let join: ClientEvent =
            serde_json::from_str(r#"{"event":"joinGroup","data":"g1"}"#).unwrap();
        assert_eq!(join, ClientEvent::JoinGroup("g1".into()));

        let leave: ClientEvent =
            serde_json::from_str(r#"{"event":"leaveGroup","data":"g1"}"#).unwrap();
        assert_eq!(leave, ClientEvent::LeaveGroup("g1".into()));
    }

    #[test]
    fn unknown_client_event_is_rejected() {
        let parsed = serde_json::from_str::<ClientEvent>(r#"{"event":"nope","data":"x"}"#);
        assert!(parsed.is_err());
    }
}
