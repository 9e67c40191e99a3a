//! Account routes: signup, login, profile, and the block/unblock pair that
//! feeds the block-state notifier.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::{self, AuthUser};
use crate::error::AppError;
use crate::models::{BlockStatus, PublicUser};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub password: String,
    pub bio: Option<String>,
}

async fn check_signup(state: &AppState, req: &SignupRequest) -> Result<(), AppError> {
    if req.email.is_empty() || req.full_name.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest("Missing details".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if state.store.user_by_email(&req.email).await?.is_some() {
        return Err(AppError::BadRequest("Account already exists".to_string()));
    }
    Ok(())
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<Value>, AppError> {
    check_signup(&state, &req).await?;

    let password_hash = auth::hash_password(&req.password)?;
    let user = state
        .store
        .create_user(&req.email, &req.full_name, &password_hash, req.bio.as_deref())
        .await?;
    let token = auth::issue_token(&user.id, &state.jwt_secret)?;

    tracing::info!(user_id = %user.id, "account created");
    Ok(Json(json!({
        "success": true,
        "token": token,
        "user": PublicUser::from(user),
        "message": "Account created successfully",
    })))
}

/// Pre-flight validation for the signup form; creates nothing.
pub async fn validate_signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<Value>, AppError> {
    check_signup(&state, &req).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .store
        .user_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    if !auth::verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = auth::issue_token(&user.id, &state.jwt_secret)?;
    Ok(Json(json!({
        "success": true,
        "token": token,
        "user": PublicUser::from(user),
    })))
}

pub async fn check(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!({ "success": true, "user": PublicUser::from(user) }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let updated = state
        .store
        .update_profile(
            &user.id,
            req.full_name.as_deref(),
            req.bio.as_deref(),
            req.profile_image.as_deref(),
        )
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({ "success": true, "user": PublicUser::from(updated) })))
}

/// Shared shape of block and unblock: mutate the persisted block set, then
/// broadcast the state change so any connection rendering the pair updates
/// live. The response does not wait on (or report) the fan-out.
async fn set_block(
    state: &AppState,
    blocker: &str,
    blocked: &str,
    is_blocked: bool,
) -> Result<Json<Value>, AppError> {
    if blocker == blocked {
        return Err(AppError::BadRequest("Cannot block yourself".to_string()));
    }
    if state.store.user_by_id(blocked).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    if is_blocked {
        state.store.block(blocker, blocked).await?;
    } else {
        state.store.unblock(blocker, blocked).await?;
    }

    state.realtime.notify_block_change(blocker, blocked, is_blocked);
    Ok(Json(json!({ "success": true })))
}

pub async fn block(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    set_block(&state, &user.id, &user_id, true).await
}

pub async fn unblock(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    set_block(&state, &user.id, &user_id, false).await
}

/// Both directions of the pair relation, from the caller's viewpoint.
pub async fn blocked_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let status = BlockStatus {
        is_current_user_blocked: state.store.is_blocked(&user_id, &user.id).await?,
        is_receiver_blocked: state.store.is_blocked(&user.id, &user_id).await?,
    };
    Ok(Json(json!({
        "success": true,
        "isCurrentUserBlocked": status.is_current_user_blocked,
        "isReceiverBlocked": status.is_receiver_blocked,
    })))
}
