use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::debug;

use parlor_db::models::ProfileRow;
use parlor_db::{Database, DbError};
use parlor_types::api::{
    AddFriendRequest, Claims, FriendList, Notice, Success, UserList, UserSummary,
};
use parlor_types::models::FriendStatus;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::{AppState, run_blocking};

pub const SEARCH_LIMIT: u32 = 10;

fn to_summary(row: ProfileRow) -> UserSummary {
    UserSummary {
        id: row.id,
        username: row.username,
        full_name: row.full_name,
        email: row.email,
        avatar_url: row.avatar_url,
    }
}

pub fn list_friends(db: &Database, user_id: i64) -> ApiResult<Vec<UserSummary>> {
    Ok(db
        .list_friends(user_id)?
        .into_iter()
        .map(to_summary)
        .collect())
}

/// Candidates for a new friend link: matching users the caller has no link
/// with yet, in any status.
pub fn search_users(db: &Database, user_id: i64, query: &str) -> ApiResult<Vec<UserSummary>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    Ok(db
        .search_unrelated_users(user_id, query, SEARCH_LIMIT)?
        .into_iter()
        .map(to_summary)
        .collect())
}

/// Link two users as friends straight away; there is no request step.
pub fn add_friend(db: &Database, user_id: i64, friend_id: i64) -> ApiResult<()> {
    if friend_id <= 0 || friend_id == user_id {
        return Err(ApiError::validation("Invalid user"));
    }

    match db.insert_friend_link(user_id, friend_id, FriendStatus::Accepted) {
        Ok(_) => {
            debug!("User {} befriended user {}", user_id, friend_id);
            Ok(())
        }
        Err(DbError::Conflict(_)) => Err(ApiError::Conflict(
            "Already friends or request pending".into(),
        )),
        Err(DbError::MissingReference(_)) => Err(ApiError::validation("Invalid user")),
        Err(e) => Err(e.into()),
    }
}

// -- Handlers --

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    #[serde(default)]
    pub query: String,
}

pub async fn list_friends_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let friends = run_blocking(&state, move |db| list_friends(db, claims.sub)).await?;
    Ok(Json(Success::new(FriendList { friends })))
}

pub async fn search_users_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<UserSearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let users = run_blocking(&state, move |db| search_users(db, claims.sub, &query.query)).await?;
    Ok(Json(Success::new(UserList { users })))
}

pub async fn add_friend_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<AddFriendRequest>,
) -> ApiResult<impl IntoResponse> {
    run_blocking(&state, move |db| add_friend(db, claims.sub, req.user_id)).await?;
    Ok((StatusCode::CREATED, Json(Success::new(Notice::new("Friend added")))))
}
