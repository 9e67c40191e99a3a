//! Direct-message routes. Persist first, then best-effort live dispatch.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{DirectMessage, PublicUser};
use crate::state::AppState;
use crate::store::Store;
use crate::ws::RealtimeService;

/// Sidebar: everyone else, plus how many of their messages to the caller
/// are still unseen.
pub async fn sidebar_users(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let users: Vec<PublicUser> = state
        .store
        .other_users(&user.id)
        .await?
        .into_iter()
        .map(PublicUser::from)
        .collect();

    let unseen: HashMap<String, i64> = state
        .store
        .unseen_counts(&user.id)
        .await?
        .into_iter()
        .collect();

    Ok(Json(json!({
        "success": true,
        "users": users,
        "unseenMessages": unseen,
    })))
}

/// Full conversation with one user; everything they sent the caller is
/// marked seen as a side effect of reading it.
pub async fn conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(other_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let messages = state.store.conversation(&user.id, &other_id).await?;
    state.store.mark_conversation_seen(&other_id, &user.id).await?;

    Ok(Json(json!({ "success": true, "messages": messages })))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: Option<String>,
    /// An already-hosted image URL; upload happens elsewhere.
    pub image: Option<String>,
}

pub async fn send(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(receiver_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Value>, AppError> {
    if req.text.as_deref().is_none_or(str::is_empty) && req.image.is_none() {
        return Err(AppError::BadRequest("Message is empty".to_string()));
    }
    if state.store.user_by_id(&receiver_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let message = persist_then_dispatch(
        &state.store,
        &state.realtime,
        &user.id,
        &receiver_id,
        req.text.as_deref(),
        req.image.as_deref(),
    )
    .await?;

    Ok(Json(json!({ "success": true, "newMessage": message })))
}

/// Persists the message, then pushes it live unless a block exists in
/// either direction at delivery time. Blocking hides, it does not prevent
/// history: the row is written either way and surfaces through the fetch
/// endpoints and unseen counts.
async fn persist_then_dispatch(
    store: &Store,
    realtime: &RealtimeService,
    sender_id: &str,
    receiver_id: &str,
    text: Option<&str>,
    image: Option<&str>,
) -> Result<DirectMessage, AppError> {
    let message = store.insert_direct(sender_id, receiver_id, text, image).await?;
    if !store.pair_blocked(sender_id, receiver_id).await? {
        realtime.dispatch_direct(&message);
    }
    Ok(message)
}

/// Flips a single message's seen flag. No push — the sender learns on their
/// own next fetch.
pub async fn mark(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(message_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.store.mark_seen(&message_id).await?;
    Ok(Json(json!({ "success": true })))
}
