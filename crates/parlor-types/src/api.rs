use serde::{Deserialize, Serialize};

use crate::models::{MessageType, Role};

// -- JWT Claims --

/// JWT claims issued by the login/register endpoints and checked by the
/// auth middleware. `sub` is the numeric user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Envelope --

/// Every successful response is a flat object carrying `"success": true`
/// next to the payload fields.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Success<T> {
    pub fn new(body: T) -> Self {
        Self {
            success: true,
            body,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

/// Payload for operations that only report a human-readable outcome.
#[derive(Debug, Serialize)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    /// Username or email.
    #[serde(alias = "username")]
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub token: String,
}

// -- Rooms --

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "isPrivate")]
    pub is_private: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub avatar: String,
    pub last_message: String,
    pub last_time: String,
    pub message_count: i64,
    pub is_private: bool,
    /// `None` when the caller sees the room only because it is public.
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct RoomList {
    pub rooms: Vec<RoomSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSearchResult {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub avatar: String,
    pub is_private: bool,
    pub is_member: bool,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct RoomSearchList {
    pub rooms: Vec<RoomSearchResult>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    pub total_messages: i64,
    pub member_count: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: RoomStats,
}

// -- Members --

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i64,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub avatar: String,
    pub online: bool,
    pub role: Role,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MemberList {
    pub members: Vec<MemberSummary>,
    pub count: usize,
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub message_type: MessageType,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    #[serde(default)]
    pub message: String,
}

/// A message joined with its author and decorated for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedMessage {
    pub id: i64,
    pub author: String,
    pub avatar: String,
    pub text: String,
    pub time: String,
    pub timestamp: String,
    pub user_id: i64,
    pub message_type: MessageType,
    pub is_edited: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageList {
    pub messages: Vec<FormattedMessage>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: String,
    pub formatted_message: FormattedMessage,
}

// -- Friends & users --

#[derive(Debug, Deserialize)]
pub struct AddFriendRequest {
    #[serde(default)]
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FriendList {
    pub friends: Vec<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user: Account,
}

#[derive(Debug, Deserialize)]
pub struct OnlineStatusRequest {
    #[serde(default = "default_online")]
    pub online: bool,
}

fn default_online() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}
