use parlor_types::models::Role;
use rusqlite::{Row, params};

use crate::models::{MemberRow, RoomAccessRow, RoomListingRow, VisibleRoomRow};
use crate::{Database, OptionalExt, Result, contains_pattern};

impl Database {
    // -- Rooms --

    /// Create a room and enrol its creator as `admin` in one transaction.
    /// Either both rows exist afterwards or neither does.
    pub fn create_room_with_admin(
        &self,
        name: &str,
        description: &str,
        is_private: bool,
        creator_id: i64,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO rooms (name, description, is_private, created_by) VALUES (?1, ?2, ?3, ?4)",
                params![name, description, is_private, creator_id],
            )?;
            let room_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO room_members (room_id, user_id, role) VALUES (?1, ?2, ?3)",
                params![room_id, creator_id, Role::Admin.as_str()],
            )?;

            tx.commit()?;
            Ok(room_id)
        })
    }

    /// Public rooms plus rooms `user_id` belongs to, newest first, each with
    /// its message count and latest message.
    pub fn list_visible_rooms(&self, user_id: i64) -> Result<Vec<RoomListingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.name, r.description, r.is_private, r.created_at, rm.role,
                        (SELECT COUNT(*) FROM messages m WHERE m.room_id = r.id),
                        last.message_text, last.created_at
                 FROM rooms r
                 LEFT JOIN room_members rm ON rm.room_id = r.id AND rm.user_id = ?1
                 LEFT JOIN messages last ON last.id = (
                     SELECT m.id FROM messages m
                     WHERE m.room_id = r.id
                     ORDER BY m.created_at DESC, m.id DESC
                     LIMIT 1
                 )
                 WHERE r.is_private = 0 OR rm.user_id IS NOT NULL
                 ORDER BY r.created_at DESC, r.id DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(RoomListingRow {
                        room: row_to_visible_room(row)?,
                        message_count: row.get(6)?,
                        last_message: row.get(7)?,
                        last_message_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Visible rooms whose name or description contains `query`, by name.
    pub fn search_visible_rooms(&self, user_id: i64, query: &str) -> Result<Vec<VisibleRoomRow>> {
        let pattern = contains_pattern(query);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.name, r.description, r.is_private, r.created_at, rm.role
                 FROM rooms r
                 LEFT JOIN room_members rm ON rm.room_id = r.id AND rm.user_id = ?1
                 WHERE (unicode_lower(r.name) LIKE ?2 ESCAPE '\\'
                        OR unicode_lower(r.description) LIKE ?2 ESCAPE '\\')
                   AND (r.is_private = 0 OR rm.user_id IS NOT NULL)
                 ORDER BY r.name",
            )?;

            let rows = stmt
                .query_map(params![user_id, pattern], row_to_visible_room)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Visibility of `room_id` and the role `user_id` holds in it, read in a
    /// single statement. `None` when the room does not exist.
    pub fn room_access(&self, room_id: i64, user_id: i64) -> Result<Option<RoomAccessRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT r.is_private, rm.role
                 FROM rooms r
                 LEFT JOIN room_members rm ON rm.room_id = r.id AND rm.user_id = ?2
                 WHERE r.id = ?1",
                params![room_id, user_id],
                |row| {
                    Ok(RoomAccessRow {
                        is_private: row.get(0)?,
                        role: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Returns (message count, member count).
    pub fn room_stats(&self, room_id: i64) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT (SELECT COUNT(*) FROM messages WHERE room_id = ?1),
                        (SELECT COUNT(*) FROM room_members WHERE room_id = ?1)",
                [room_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })
    }

    // -- Membership --

    /// Enrol `user_id` in `room_id`. A repeat enrolment surfaces as
    /// `DbError::Conflict`, an unknown room or user as
    /// `DbError::MissingReference`.
    pub fn add_member(&self, room_id: i64, user_id: i64, role: Role) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO room_members (room_id, user_id, role) VALUES (?1, ?2, ?3)",
                params![room_id, user_id, role.as_str()],
            )?;
            Ok(())
        })
    }

    /// Members of a room, admins first, then by username.
    pub fn list_members(&self, room_id: i64) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.full_name, u.avatar_url, u.is_online, rm.role
                 FROM room_members rm
                 JOIN users u ON u.id = rm.user_id
                 WHERE rm.room_id = ?1
                 ORDER BY CASE rm.role WHEN 'admin' THEN 0 ELSE 1 END, u.username",
            )?;

            let rows = stmt
                .query_map([room_id], |row| {
                    Ok(MemberRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        full_name: row.get(2)?,
                        avatar_url: row.get(3)?,
                        is_online: row.get(4)?,
                        role: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn row_to_visible_room(row: &Row<'_>) -> rusqlite::Result<VisibleRoomRow> {
    Ok(VisibleRoomRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_private: row.get(3)?,
        created_at: row.get(4)?,
        role: row.get(5)?,
    })
}
