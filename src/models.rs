//! Domain records and their wire representations.
//!
//! Everything serializes in camelCase to match the socket event payloads and
//! REST bodies the clients already speak. Ids are UUID v4 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered account, as stored. The password hash never leaves the
/// server; use [`PublicUser`] for anything client-facing.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub profile_image: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Client-facing view of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub profile_image: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            profile_image: user.profile_image,
            bio: user.bio,
            created_at: user.created_at,
        }
    }
}

/// A one-to-one message. Immutable after creation except for `seen`,
/// which flips false→true exactly once, on first read by the receiver.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: Option<String>,
    pub image: Option<String>,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

/// A group conversation. `members` is assembled from the membership table;
/// the creator is always a member.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    #[sqlx(skip)]
    pub members: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// A message in a group conversation. No per-recipient seen tracking.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    pub id: String,
    pub sender_id: String,
    pub group_id: String,
    pub text: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The name/avatar slice of a member, for group rosters.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub id: String,
    pub full_name: String,
    pub profile_image: String,
}

/// Block relation between two users from the viewer's perspective. The two
/// directions are independent; both can hold at once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStatus {
    /// The other party has blocked the viewer.
    pub is_current_user_blocked: bool,
    /// The viewer has blocked the other party.
    pub is_receiver_blocked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_message_serializes_camel_case() {
        let msg = DirectMessage {
            id: "m1".into(),
            sender_id: "a".into(),
            receiver_id: "b".into(),
            text: Some("hi".into()),
            image: None,
            seen: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["senderId"], "a");
        assert_eq!(value["receiverId"], "b");
        assert_eq!(value["seen"], false);
        assert!(value.get("sender_id").is_none());
    }

    #[test]
    fn public_user_has_no_password_field() {
        let user = User {
            id: "u1".into(),
            email: "a@example.com".into(),
            full_name: "A".into(),
            password_hash: "secret".into(),
            profile_image: String::new(),
            bio: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["fullName"], "A");
    }
}
