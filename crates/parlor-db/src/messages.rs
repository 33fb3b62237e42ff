use parlor_types::models::MessageType;
use rusqlite::{Row, params};

use crate::models::MessageRow;
use crate::{Database, OptionalExt, Result};

// JOIN users to fetch author names in a single query
const MESSAGE_SELECT: &str = "SELECT m.id, m.room_id, m.user_id, u.username, u.full_name,
            m.message_text, m.message_type, m.is_edited, m.created_at
     FROM messages m
     JOIN users u ON u.id = m.user_id";

impl Database {
    pub fn insert_message(
        &self,
        room_id: i64,
        user_id: i64,
        text: &str,
        message_type: MessageType,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (room_id, user_id, message_text, message_type) VALUES (?1, ?2, ?3, ?4)",
                params![room_id, user_id, text, message_type.as_str()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
            conn.query_row(&sql, [id], row_to_message).optional()
        })
    }

    /// One page of a room's history, NEWEST FIRST: skips the `offset` most
    /// recent messages and returns at most `limit` of the ones before them.
    pub fn get_messages_newest_first(
        &self,
        room_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE m.room_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;

            let rows = stmt
                .query_map(params![room_id, limit, offset], row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// At most `limit` messages created strictly after `since`, oldest first.
    pub fn get_messages_since(
        &self,
        room_id: i64,
        since: &str,
        limit: u32,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE m.room_id = ?1 AND m.created_at > ?2
                 ORDER BY m.created_at ASC, m.id ASC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;

            let rows = stmt
                .query_map(params![room_id, since, limit], row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Replace the text of a message authored by `user_id` and mark it
    /// edited. Returns false when no such message exists or `user_id` is not
    /// its author; the two cases are not told apart.
    pub fn update_message_text(&self, id: i64, user_id: i64, text: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE messages SET message_text = ?3, is_edited = 1 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id, text],
            )?;
            Ok(affected > 0)
        })
    }

    /// Same ownership rule as `update_message_text`.
    pub fn delete_message(&self, id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(affected > 0)
        })
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        full_name: row.get(4)?,
        message_text: row.get(5)?,
        message_type: row.get(6)?,
        is_edited: row.get(7)?,
        created_at: row.get(8)?,
    })
}
