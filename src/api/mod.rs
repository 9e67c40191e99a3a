//! The REST boundary. Handlers persist first, then trigger realtime fan-out;
//! the requester's response never depends on whether any live push landed.

pub mod groups;
pub mod messages;
pub mod users;

use axum::Router;
use axum::routing::{delete, get, post, put};

use crate::state::AppState;
use crate::ws::session::ws_upgrade;

pub fn router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/signup", post(users::signup))
        .route("/validate-signup", post(users::validate_signup))
        .route("/login", post(users::login))
        .route("/check", get(users::check))
        .route("/update", put(users::update_profile))
        .route("/block/{userId}", put(users::block))
        .route("/unblock/{userId}", put(users::unblock))
        .route("/blocked-status/{userId}", get(users::blocked_status));

    let message_routes = Router::new()
        .route("/send/{id}", post(messages::send))
        .route("/mark/{id}", post(messages::mark))
        .route("/users", get(messages::sidebar_users))
        .route("/messages/{id}", get(messages::conversation));

    let group_routes = Router::new()
        .route("/create", post(groups::create))
        .route("/user-groups", get(groups::user_groups))
        .route("/messages/{groupId}", get(groups::group_messages))
        .route("/send/{id}", post(groups::send))
        .route("/users/{groupId}", get(groups::members))
        .route("/update/{groupId}", post(groups::update))
        .route("/leave/{groupId}", post(groups::leave))
        .route("/delete/{groupId}", delete(groups::delete));

    Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/messages", message_routes)
        .nest("/api/groups", group_routes)
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}
