//! SQLite persistence.
//!
//! The store is the durability backstop for realtime delivery: every message
//! is persisted before any fan-out is attempted, so a missed live push is
//! recoverable through the fetch endpoints. Schema is created with
//! idempotent DDL at startup.

use std::str::FromStr;

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use uuid::Uuid;

use crate::models::{DirectMessage, Group, GroupMessage, MemberProfile, User};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        profile_image TEXT NOT NULL DEFAULT '',
        bio TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS blocks (
        blocker_id TEXT NOT NULL,
        blocked_id TEXT NOT NULL,
        PRIMARY KEY (blocker_id, blocked_id)
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        sender_id TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        text TEXT,
        image TEXT,
        seen INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chat_groups (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        image TEXT,
        created_by TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS group_members (
        group_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (group_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS group_messages (
        id TEXT PRIMARY KEY,
        sender_id TEXT NOT NULL,
        group_id TEXT NOT NULL,
        text TEXT,
        image TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_pair ON messages (receiver_id, sender_id)",
    "CREATE INDEX IF NOT EXISTS idx_group_messages_group ON group_messages (group_id)",
];

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database at `url` and applies the schema.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ----- users -----

    pub async fn create_user(
        &self,
        email: &str,
        full_name: &str,
        password_hash: &str,
        bio: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            password_hash: password_hash.to_string(),
            profile_image: String::new(),
            bio: bio.map(str::to_string),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO users (id, email, full_name, password_hash, profile_image, bio, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(&user.profile_image)
        .bind(&user.bio)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn user_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Everyone except `user_id`, for the sidebar.
    pub async fn other_users(&self, user_id: &str) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id != ? ORDER BY full_name")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        full_name: Option<&str>,
        bio: Option<&str>,
        profile_image: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                full_name = COALESCE(?, full_name),
                bio = COALESCE(?, bio),
                profile_image = COALESCE(?, profile_image)
             WHERE id = ?",
        )
        .bind(full_name)
        .bind(bio)
        .bind(profile_image)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        self.user_by_id(user_id).await
    }

    // ----- blocks -----

    pub async fn block(&self, blocker_id: &str, blocked_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO blocks (blocker_id, blocked_id) VALUES (?, ?)")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn unblock(&self, blocker_id: &str, blocked_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM blocks WHERE blocker_id = ? AND blocked_id = ?")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Has `blocker_id` blocked `blocked_id`? One direction only.
    pub async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM blocks WHERE blocker_id = ? AND blocked_id = ?")
                .bind(blocker_id)
                .bind(blocked_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// True if either user blocks the other. This is the delivery-time gate
    /// for direct-message push; persistence is never gated.
    pub async fn pair_blocked(&self, a: &str, b: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM blocks
             WHERE (blocker_id = ? AND blocked_id = ?) OR (blocker_id = ? AND blocked_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    // ----- direct messages -----

    pub async fn insert_direct(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: Option<&str>,
        image: Option<&str>,
    ) -> Result<DirectMessage, sqlx::Error> {
        let message = DirectMessage {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text: text.map(str::to_string),
            image: image.map(str::to_string),
            seen: false,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO messages (id, sender_id, receiver_id, text, image, seen, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.text)
        .bind(&message.image)
        .bind(message.seen)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(message)
    }

    /// Both directions of the conversation, in arrival order.
    pub async fn conversation(
        &self,
        me: &str,
        other: &str,
    ) -> Result<Vec<DirectMessage>, sqlx::Error> {
        sqlx::query_as::<_, DirectMessage>(
            "SELECT * FROM messages
             WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
             ORDER BY created_at ASC",
        )
        .bind(me)
        .bind(other)
        .bind(other)
        .bind(me)
        .fetch_all(&self.pool)
        .await
    }

    /// Marks everything `sender_id` sent to `receiver_id` as seen.
    pub async fn mark_conversation_seen(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE messages SET seen = 1 WHERE sender_id = ? AND receiver_id = ? AND seen = 0")
            .bind(sender_id)
            .bind(receiver_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_seen(&self, message_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE messages SET seen = 1 WHERE id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Unseen direct-message counts for the sidebar, keyed by sender.
    pub async fn unseen_counts(&self, receiver_id: &str) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT sender_id, COUNT(*) FROM messages
             WHERE receiver_id = ? AND seen = 0
             GROUP BY sender_id",
        )
        .bind(receiver_id)
        .fetch_all(&self.pool)
        .await
    }

    // ----- groups -----

    pub async fn create_group(
        &self,
        name: &str,
        image: Option<&str>,
        member_ids: &[String],
        created_by: &str,
    ) -> Result<Group, sqlx::Error> {
        let creator_id = created_by.to_string();
        let mut members: Vec<String> = Vec::with_capacity(member_ids.len() + 1);
        for id in member_ids.iter().chain(std::iter::once(&creator_id)) {
            if !members.contains(id) {
                members.push(id.clone());
            }
        }

        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            image: image.map(str::to_string),
            members: members.clone(),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        };
        // Group row and membership land together or not at all.
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO chat_groups (id, name, image, created_by, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.image)
        .bind(&group.created_by)
        .bind(group.created_at)
        .execute(&mut *tx)
        .await?;
        for user_id in &members {
            sqlx::query("INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?, ?)")
                .bind(&group.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(group)
    }

    pub async fn group_by_id(&self, group_id: &str) -> Result<Option<Group>, sqlx::Error> {
        let group = sqlx::query_as::<_, Group>("SELECT * FROM chat_groups WHERE id = ?")
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?;
        match group {
            Some(mut group) => {
                group.members = self.group_member_ids(group_id).await?;
                Ok(Some(group))
            }
            None => Ok(None),
        }
    }

    pub async fn groups_for_user(&self, user_id: &str) -> Result<Vec<Group>, sqlx::Error> {
        let mut groups = sqlx::query_as::<_, Group>(
            "SELECT g.* FROM chat_groups g
             JOIN group_members m ON m.group_id = g.id
             WHERE m.user_id = ?
             ORDER BY g.created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        for group in &mut groups {
            group.members = self.group_member_ids(&group.id).await?;
        }
        Ok(groups)
    }

    pub async fn group_member_ids(&self, group_id: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT user_id FROM group_members WHERE group_id = ?")
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn is_member(&self, group_id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM group_members WHERE group_id = ? AND user_id = ?")
                .bind(group_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    pub async fn add_members(&self, group_id: &str, user_ids: &[String]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for user_id in user_ids {
            sqlx::query("INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?, ?)")
                .bind(group_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn update_group_meta(
        &self,
        group_id: &str,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE chat_groups SET name = COALESCE(?, name), image = COALESCE(?, image) WHERE id = ?",
        )
        .bind(name)
        .bind(image)
        .bind(group_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_member(&self, group_id: &str, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Removes the group, its membership rows, and its message history in a
    /// single transaction, so a failed statement leaves all three intact.
    pub async fn delete_group(&self, group_id: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM group_messages WHERE group_id = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM group_members WHERE group_id = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chat_groups WHERE id = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn member_profiles(&self, group_id: &str) -> Result<Vec<MemberProfile>, sqlx::Error> {
        sqlx::query_as::<_, MemberProfile>(
            "SELECT u.id, u.full_name, u.profile_image FROM users u
             JOIN group_members m ON m.user_id = u.id
             WHERE m.group_id = ?",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
    }

    // ----- group messages -----

    pub async fn insert_group_message(
        &self,
        sender_id: &str,
        group_id: &str,
        text: Option<&str>,
        image: Option<&str>,
    ) -> Result<GroupMessage, sqlx::Error> {
        let message = GroupMessage {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            group_id: group_id.to_string(),
            text: text.map(str::to_string),
            image: image.map(str::to_string),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO group_messages (id, sender_id, group_id, text, image, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.group_id)
        .bind(&message.text)
        .bind(&message.image)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(message)
    }

    pub async fn group_messages(&self, group_id: &str) -> Result<Vec<GroupMessage>, sqlx::Error> {
        sqlx::query_as::<_, GroupMessage>(
            "SELECT * FROM group_messages WHERE group_id = ? ORDER BY created_at ASC",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
    }
}
