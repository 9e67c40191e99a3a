//! Group routes: lifecycle, membership, and group messaging.
//!
//! Authorization lives here, not in the room router: membership is checked
//! before anything is emitted toward a group's room, and clients are only
//! told to join rooms for groups they belong to.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::Group;
use crate::state::AppState;
use crate::store::Store;

async fn require_group(store: &Store, group_id: &str) -> Result<Group, AppError> {
    store
        .group_by_id(group_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".to_string()))
}

async fn require_member(store: &Store, group_id: &str, user_id: &str) -> Result<(), AppError> {
    if !store.is_member(group_id, user_id).await? {
        return Err(AppError::Forbidden(
            "You are not a member of this group".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
    pub image: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Json<Value>, AppError> {
    if req.name.is_empty() {
        return Err(AppError::BadRequest("Group name is required".to_string()));
    }

    let group = state
        .store
        .create_group(&req.name, req.image.as_deref(), &req.members, &user.id)
        .await?;

    state.realtime.announce_group_created(&group);
    tracing::info!(group_id = %group.id, created_by = %user.id, "group created");

    Ok(Json(json!({ "success": true, "group": group })))
}

pub async fn user_groups(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let groups = state.store.groups_for_user(&user.id).await?;
    Ok(Json(json!({ "success": true, "groups": groups })))
}

pub async fn group_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_group(&state.store, &group_id).await?;
    require_member(&state.store, &group_id, &user.id).await?;

    let messages = state.store.group_messages(&group_id).await?;
    Ok(Json(json!({ "success": true, "messages": messages })))
}

#[derive(Debug, Deserialize)]
pub struct SendGroupMessageRequest {
    pub text: Option<String>,
    pub image: Option<String>,
}

pub async fn send(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(group_id): Path<String>,
    Json(req): Json<SendGroupMessageRequest>,
) -> Result<Json<Value>, AppError> {
    if req.text.as_deref().is_none_or(str::is_empty) && req.image.is_none() {
        return Err(AppError::BadRequest("Message is empty".to_string()));
    }
    require_group(&state.store, &group_id).await?;
    require_member(&state.store, &group_id, &user.id).await?;

    let message = state
        .store
        .insert_group_message(&user.id, &group_id, req.text.as_deref(), req.image.as_deref())
        .await?;

    // Only connections currently viewing the conversation get a live push;
    // other members catch up through the history endpoint.
    state.realtime.dispatch_group(&message);

    Ok(Json(json!({ "success": true, "groupMessage": message })))
}

pub async fn members(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_group(&state.store, &group_id).await?;
    let members = state.store.member_profiles(&group_id).await?;
    Ok(Json(json!({ "success": true, "members": members })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub image: Option<String>,
    /// Merged into the existing member set; updates never remove members.
    pub members: Option<Vec<String>>,
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(group_id): Path<String>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<Json<Value>, AppError> {
    let existing = require_group(&state.store, &group_id).await?;
    require_member(&state.store, &group_id, &user.id).await?;

    state
        .store
        .update_group_meta(&group_id, req.name.as_deref(), req.image.as_deref())
        .await?;

    let mut newly_added: Vec<String> = Vec::new();
    if let Some(incoming) = req.members {
        for id in incoming.into_iter().chain(std::iter::once(user.id.clone())) {
            if !existing.members.contains(&id) && !newly_added.contains(&id) {
                newly_added.push(id);
            }
        }
        state.store.add_members(&group_id, &newly_added).await?;
    }

    let updated = require_group(&state.store, &group_id).await?;

    // Connections viewing the room see the change immediately; people who
    // were just added get the group as if it were newly created for them.
    state.realtime.notify_group_updated(&updated);
    for member_id in &newly_added {
        state.realtime.notify_member_added(member_id, &updated);
    }

    Ok(Json(json!({
        "success": true,
        "updatedGroup": updated,
        "message": "Group updated",
    })))
}

pub async fn leave(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_group(&state.store, &group_id).await?;
    state.store.remove_member(&group_id, &user.id).await?;

    // Targeted sends so every remaining member's sidebar refreshes, whether
    // or not they have the conversation open.
    if let Some(updated) = state.store.group_by_id(&group_id).await? {
        for member_id in &updated.members {
            state.realtime.notify_group_updated_user(member_id, &updated);
        }
    }

    Ok(Json(json!({ "success": true, "message": "You left group" })))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let group = require_group(&state.store, &group_id).await?;
    if group.created_by != user.id {
        return Err(AppError::Forbidden(
            "Only the creator can delete this group".to_string(),
        ));
    }

    state.store.delete_group(&group_id).await?;
    state.realtime.notify_group_deleted(&group_id);
    tracing::info!(group_id = %group_id, "group deleted");

    Ok(Json(json!({ "success": true, "message": "Group deleted" })))
}
