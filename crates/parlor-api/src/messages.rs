use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::{debug, warn};

use parlor_db::Database;
use parlor_types::api::{
    Claims, EditMessageRequest, FormattedMessage, MessageList, Notice, SendMessageRequest,
    SendMessageResponse, Success,
};
use parlor_types::models::MessageType;

use crate::access::ensure_access;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::format::format_message;
use crate::rooms::check_room_id;
use crate::{AppState, run_blocking};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

/// Post `text` to a room the caller can access and return it formatted.
pub fn send_message(
    db: &Database,
    user_id: i64,
    room_id: i64,
    text: &str,
    message_type: MessageType,
) -> ApiResult<FormattedMessage> {
    let text = text.trim();
    if room_id <= 0 || text.is_empty() {
        return Err(ApiError::validation("Message and room ID are required"));
    }
    ensure_access(db, user_id, room_id)?;

    let message_id = db.insert_message(room_id, user_id, text, message_type)?;
    let row = db
        .get_message(message_id)?
        .ok_or_else(|| ApiError::Internal(format!("message {} vanished after insert", message_id)))?;

    debug!("User {} posted message {} in room {}", user_id, message_id, room_id);
    Ok(format_message(row))
}

/// One page of history in chronological order.
///
/// `offset` counts back from the newest message: offset 0 is the latest
/// `limit` messages, offset `limit` the page before that, and so on.
pub fn list_messages(
    db: &Database,
    user_id: i64,
    room_id: i64,
    limit: u32,
    offset: u32,
) -> ApiResult<Vec<FormattedMessage>> {
    check_room_id(room_id)?;
    ensure_access(db, user_id, room_id)?;

    let limit = limit.min(MAX_PAGE_SIZE);
    let mut rows = db.get_messages_newest_first(room_id, limit, offset)?;
    rows.reverse();

    Ok(rows.into_iter().map(format_message).collect())
}

/// Messages posted after `since`, oldest first, at most `MAX_PAGE_SIZE`.
/// A blank `since` yields nothing; history is read through `list_messages`.
pub fn recent_messages(
    db: &Database,
    user_id: i64,
    room_id: i64,
    since: &str,
) -> ApiResult<Vec<FormattedMessage>> {
    check_room_id(room_id)?;
    ensure_access(db, user_id, room_id)?;

    let since = since.trim();
    if since.is_empty() {
        return Ok(Vec::new());
    }

    let rows = db.get_messages_since(room_id, since, MAX_PAGE_SIZE)?;
    Ok(rows.into_iter().map(format_message).collect())
}

pub fn edit_message(db: &Database, user_id: i64, message_id: i64, text: &str) -> ApiResult<()> {
    let text = text.trim();
    if message_id <= 0 || text.is_empty() {
        return Err(ApiError::validation("Message ID and text are required"));
    }

    if db.update_message_text(message_id, user_id, text)? {
        debug!("User {} edited message {}", user_id, message_id);
        Ok(())
    } else {
        warn!("User {} could not edit message {}", user_id, message_id);
        Err(ApiError::NotFoundOrForbidden("Failed to edit message".into()))
    }
}

pub fn delete_message(db: &Database, user_id: i64, message_id: i64) -> ApiResult<()> {
    if message_id <= 0 {
        return Err(ApiError::validation("Message ID is required"));
    }

    if db.delete_message(message_id, user_id)? {
        debug!("User {} deleted message {}", user_id, message_id);
        Ok(())
    } else {
        warn!("User {} could not delete message {}", user_id, message_id);
        Err(ApiError::NotFoundOrForbidden("Failed to delete message".into()))
    }
}

// -- Handlers --

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    /// Stored timestamp of the last message the client has.
    #[serde(default)]
    pub since: String,
}

pub async fn list_messages_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(room_id): ApiPath<i64>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let messages = run_blocking(&state, move |db| {
        list_messages(db, claims.sub, room_id, page.limit, page.offset)
    })
    .await?;

    Ok(Json(Success::new(MessageList { messages })))
}

pub async fn send_message_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(room_id): ApiPath<i64>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let formatted_message = run_blocking(&state, move |db| {
        send_message(db, claims.sub, room_id, &req.message, req.message_type)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(Success::new(SendMessageResponse {
            message: "Message sent successfully".into(),
            formatted_message,
        })),
    ))
}

pub async fn recent_messages_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(room_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<SinceQuery>,
) -> ApiResult<impl IntoResponse> {
    let messages = run_blocking(&state, move |db| {
        recent_messages(db, claims.sub, room_id, &query.since)
    })
    .await?;

    Ok(Json(Success::new(MessageList { messages })))
}

pub async fn edit_message_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(message_id): ApiPath<i64>,
    ApiJson(req): ApiJson<EditMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    run_blocking(&state, move |db| edit_message(db, claims.sub, message_id, &req.message)).await?;
    Ok(Json(Success::new(Notice::new("Message edited successfully"))))
}

pub async fn delete_message_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(message_id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    run_blocking(&state, move |db| delete_message(db, claims.sub, message_id)).await?;
    Ok(Json(Success::new(Notice::new("Message deleted successfully"))))
}
