use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::debug;

use parlor_db::{Database, DbError};
use parlor_db::models::VisibleRoomRow;
use parlor_types::api::{
    AddMemberRequest, Claims, CreateRoomRequest, CreateRoomResponse, MemberList, MemberSummary,
    Notice, RoomList, RoomSearchList, RoomSearchResult, RoomStats, RoomSummary, StatsResponse,
    Success,
};
use parlor_types::models::Role;

use crate::access::ensure_access;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::format::{NO_MESSAGES, avatar_glyph, display_name, room_time};
use crate::{AppState, MembershipPolicy, run_blocking};

pub const MAX_ROOM_NAME_CHARS: usize = 100;

/// Reject non-positive room ids before touching the store.
pub(crate) fn check_room_id(room_id: i64) -> ApiResult<()> {
    if room_id <= 0 {
        return Err(ApiError::validation("Invalid room ID"));
    }
    Ok(())
}

fn stored_role(raw: Option<&str>) -> ApiResult<Option<Role>> {
    raw.map(str::parse::<Role>)
        .transpose()
        .map_err(|e| ApiError::from(DbError::Corrupt(e.to_string())))
}

// -- Operations --

/// Create a room with `user_id` as its only admin.
pub fn create_room(
    db: &Database,
    user_id: i64,
    name: &str,
    description: &str,
    is_private: bool,
) -> ApiResult<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Room name is required"));
    }
    if name.chars().count() > MAX_ROOM_NAME_CHARS {
        return Err(ApiError::validation(format!(
            "Room name must be at most {} characters",
            MAX_ROOM_NAME_CHARS
        )));
    }

    match db.create_room_with_admin(name, description.trim(), is_private, user_id) {
        Ok(room_id) => {
            debug!("User {} created room {} '{}'", user_id, room_id, name);
            Ok(room_id)
        }
        Err(DbError::Conflict(_)) => Err(ApiError::Conflict(
            "A room with that name already exists".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub fn list_visible_rooms(db: &Database, user_id: i64) -> ApiResult<Vec<RoomSummary>> {
    db.list_visible_rooms(user_id)?
        .into_iter()
        .map(|row| -> ApiResult<RoomSummary> {
            let role = stored_role(row.room.role.as_deref())?;
            let (last_message, last_time) = match (row.last_message, row.last_message_at) {
                (Some(text), Some(at)) => (text, room_time(&at)),
                _ => (NO_MESSAGES.to_string(), String::new()),
            };

            Ok(RoomSummary {
                id: row.room.id,
                avatar: avatar_glyph(&row.room.name),
                name: row.room.name,
                description: row.room.description,
                last_message,
                last_time,
                message_count: row.message_count,
                is_private: row.room.is_private,
                role,
            })
        })
        .collect()
}

/// Visible rooms matching `query`. A blank query matches nothing.
pub fn search_rooms(db: &Database, user_id: i64, query: &str) -> ApiResult<Vec<RoomSearchResult>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    db.search_visible_rooms(user_id, query)?
        .into_iter()
        .map(|row: VisibleRoomRow| -> ApiResult<RoomSearchResult> {
            let role = stored_role(row.role.as_deref())?;
            Ok(RoomSearchResult {
                id: row.id,
                avatar: avatar_glyph(&row.name),
                name: row.name,
                description: row.description,
                is_private: row.is_private,
                is_member: role.is_some(),
                role,
            })
        })
        .collect()
}

/// Add `target_user_id` to a room on behalf of `acting_user_id`.
pub fn add_member(
    db: &Database,
    policy: MembershipPolicy,
    acting_user_id: i64,
    room_id: i64,
    target_user_id: i64,
    role: Role,
) -> ApiResult<()> {
    check_room_id(room_id)?;
    if target_user_id <= 0 {
        return Err(ApiError::validation("Invalid user"));
    }

    let access = db
        .room_access(room_id, acting_user_id)?
        .ok_or_else(|| ApiError::validation("Room not found"))?;

    if policy == MembershipPolicy::AdminOnly
        && access.role.as_deref() != Some(Role::Admin.as_str())
    {
        return Err(ApiError::AccessDenied);
    }

    match db.add_member(room_id, target_user_id, role) {
        Ok(()) => {
            debug!(
                "User {} added user {} to room {} as {}",
                acting_user_id, target_user_id, room_id, role
            );
            Ok(())
        }
        Err(DbError::Conflict(_)) => Err(ApiError::Conflict(
            "User is already a member of this room".into(),
        )),
        Err(DbError::MissingReference(_)) => Err(ApiError::validation("Invalid user")),
        Err(e) => Err(e.into()),
    }
}

/// Enrol the caller in a public room.
pub fn join_room(db: &Database, user_id: i64, room_id: i64) -> ApiResult<()> {
    check_room_id(room_id)?;

    match db.room_access(room_id, user_id)? {
        Some(room) if !room.is_private => {}
        _ => return Err(ApiError::AccessDenied),
    }

    match db.add_member(room_id, user_id, Role::Member) {
        Ok(()) => {
            debug!("User {} joined room {}", user_id, room_id);
            Ok(())
        }
        Err(DbError::Conflict(_)) => Err(ApiError::Conflict(
            "Already a member of this room".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub fn list_members(db: &Database, user_id: i64, room_id: i64) -> ApiResult<Vec<MemberSummary>> {
    check_room_id(room_id)?;
    ensure_access(db, user_id, room_id)?;

    db.list_members(room_id)?
        .into_iter()
        .map(|row| -> ApiResult<MemberSummary> {
            let role = row
                .role
                .parse::<Role>()
                .map_err(|e| ApiError::from(DbError::Corrupt(e.to_string())))?;

            Ok(MemberSummary {
                id: row.user_id,
                name: display_name(&row.full_name, &row.username).to_string(),
                avatar: avatar_glyph(&row.username),
                username: row.username,
                online: row.is_online,
                role,
                avatar_url: row.avatar_url,
            })
        })
        .collect()
}

pub fn room_stats(db: &Database, user_id: i64, room_id: i64) -> ApiResult<RoomStats> {
    check_room_id(room_id)?;
    ensure_access(db, user_id, room_id)?;

    let (total_messages, member_count) = db.room_stats(room_id)?;
    Ok(RoomStats {
        total_messages,
        member_count,
    })
}

// -- Handlers --

#[derive(Debug, Deserialize)]
pub struct RoomSearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn list_rooms_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rooms = run_blocking(&state, move |db| list_visible_rooms(db, claims.sub)).await?;
    Ok(Json(Success::new(RoomList { rooms })))
}

pub async fn create_room_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateRoomRequest>,
) -> ApiResult<impl IntoResponse> {
    let room_id = run_blocking(&state, move |db| {
        create_room(db, claims.sub, &req.name, &req.description, req.is_private)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(Success::new(CreateRoomResponse {
            room_id,
            message: "Room created successfully".into(),
        })),
    ))
}

pub async fn search_rooms_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<RoomSearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let rooms = run_blocking(&state, move |db| search_rooms(db, claims.sub, &query.q)).await?;
    Ok(Json(Success::new(RoomSearchList { rooms })))
}

pub async fn list_members_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(room_id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let members = run_blocking(&state, move |db| list_members(db, claims.sub, room_id)).await?;
    Ok(Json(Success::new(MemberList {
        count: members.len(),
        members,
    })))
}

pub async fn add_member_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(room_id): ApiPath<i64>,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> ApiResult<impl IntoResponse> {
    let policy = state.membership_policy;
    run_blocking(&state, move |db| {
        add_member(db, policy, claims.sub, room_id, req.user_id, req.role)
    })
    .await?;

    Ok(Json(Success::new(Notice::new("Member added successfully"))))
}

pub async fn join_room_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(room_id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    run_blocking(&state, move |db| join_room(db, claims.sub, room_id)).await?;
    Ok(Json(Success::new(Notice::new("Joined room successfully"))))
}

pub async fn room_stats_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(room_id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let stats = run_blocking(&state, move |db| room_stats(db, claims.sub, room_id)).await?;
    Ok(Json(Success::new(StatsResponse { stats })))
}
