pub mod access;
pub mod auth;
pub mod error;
pub mod extract;
pub mod format;
pub mod friends;
pub mod messages;
pub mod middleware;
pub mod rooms;

use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{get, post, put},
};
use tracing::error;

use parlor_db::Database;
use parlor_types::api::{Health, Success};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_auth;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub membership_policy: MembershipPolicy,
}

/// Who may add other users to a room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MembershipPolicy {
    /// Any authenticated user may add anyone to any room.
    #[default]
    Open,
    /// Only the room's admins may add members.
    AdminOnly,
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler));

    let protected_routes = Router::new()
        .route("/rooms", get(rooms::list_rooms_handler).post(rooms::create_room_handler))
        .route("/rooms/search", get(rooms::search_rooms_handler))
        .route(
            "/rooms/{room_id}/messages",
            get(messages::list_messages_handler).post(messages::send_message_handler),
        )
        .route("/rooms/{room_id}/messages/recent", get(messages::recent_messages_handler))
        .route(
            "/rooms/{room_id}/members",
            get(rooms::list_members_handler).post(rooms::add_member_handler),
        )
        .route("/rooms/{room_id}/join", post(rooms::join_room_handler))
        .route("/rooms/{room_id}/stats", get(rooms::room_stats_handler))
        .route(
            "/messages/{message_id}",
            put(messages::edit_message_handler).delete(messages::delete_message_handler),
        )
        .route("/friends", get(friends::list_friends_handler).post(friends::add_friend_handler))
        .route("/users/search", get(friends::search_users_handler))
        .route("/users/me", get(auth::account_handler))
        .route("/users/me/status", put(auth::update_status_handler))
        // route_layer so unknown paths reach the fallback instead of a 401
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(unknown_endpoint)
        .with_state(state)
}

async fn health() -> Json<Success<Health>> {
    Json(Success::new(Health { status: "ok" }))
}

async fn unknown_endpoint() -> ApiError {
    ApiError::UnknownEndpoint
}

/// Run a store operation on the blocking pool.
pub(crate) async fn run_blocking<F, T>(state: &AppState, op: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || op(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
}
