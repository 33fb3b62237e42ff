//! Row types mapped straight from SQLite. Enum-like columns stay as text
//! here; the API layer parses them into `parlor_types::models`.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub created_at: String,
}

/// Public profile columns of a user, as returned by searches and friend
/// listings.
pub struct ProfileRow {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// A room as seen by one caller: `role` is the caller's membership role,
/// `None` when the room is visible only because it is public.
pub struct VisibleRoomRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_private: bool,
    pub created_at: String,
    pub role: Option<String>,
}

/// A visible room plus its activity, computed at query time.
pub struct RoomListingRow {
    pub room: VisibleRoomRow,
    pub message_count: i64,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
}

/// The facts the access gate decides on.
pub struct RoomAccessRow {
    pub is_private: bool,
    pub role: Option<String>,
}

pub struct MemberRow {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub role: String,
}

/// A message joined with its author's names.
pub struct MessageRow {
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub message_text: String,
    pub message_type: String,
    pub is_edited: bool,
    pub created_at: String,
}

pub struct FriendLinkRow {
    pub id: i64,
    pub user_id: i64,
    pub friend_id: i64,
    pub status: String,
    pub requested_at: String,
    pub accepted_at: Option<String>,
}
