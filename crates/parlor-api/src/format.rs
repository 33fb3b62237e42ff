use chrono::{DateTime, Local, NaiveDateTime, Utc};
use tracing::warn;

use parlor_db::models::MessageRow;
use parlor_types::api::FormattedMessage;
use parlor_types::models::MessageType;

/// Placeholder shown for a room with no messages.
pub const NO_MESSAGES: &str = "No messages yet";

/// First character of `name`, upper-cased. Empty input gives "".
pub fn avatar_glyph(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}

/// The full name when one is set, else the username.
pub fn display_name<'a>(full_name: &'a str, username: &'a str) -> &'a str {
    let full_name = full_name.trim();
    if full_name.is_empty() { username } else { full_name }
}

/// Stored timestamps are UTC without zone, with optional fractional seconds.
pub fn parse_db_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn local_clock(raw: &str, pattern: &str) -> String {
    match parse_db_timestamp(raw) {
        Some(ts) => ts.with_timezone(&Local).format(pattern).to_string(),
        None => {
            warn!("Corrupt timestamp '{}'", raw);
            String::new()
        }
    }
}

/// Server-local "HH:MM AM" label attached to each message.
pub fn message_time(raw: &str) -> String {
    local_clock(raw, "%H:%M %p")
}

/// Server-local "HH:MM" label for a room's latest message.
pub fn room_time(raw: &str) -> String {
    local_clock(raw, "%H:%M")
}

pub fn format_message(row: MessageRow) -> FormattedMessage {
    let message_type = row.message_type.parse().unwrap_or_else(|e| {
        warn!("Corrupt message_type on message {}: {}", row.id, e);
        MessageType::Text
    });

    FormattedMessage {
        id: row.id,
        author: display_name(&row.full_name, &row.username).to_string(),
        avatar: avatar_glyph(&row.username),
        time: message_time(&row.created_at),
        text: row.message_text,
        timestamp: row.created_at,
        user_id: row.user_id,
        message_type,
        is_edited: row.is_edited,
    }
}
