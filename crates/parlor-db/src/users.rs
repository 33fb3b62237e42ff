use rusqlite::{Connection, Row, params};

use crate::models::{ProfileRow, UserRow};
use crate::{Database, OptionalExt, Result, contains_pattern};

const USER_COLUMNS: &str =
    "id, username, full_name, email, password, avatar_url, is_online, created_at";

impl Database {
    /// Insert a user and return its id. A taken username or email surfaces
    /// as `DbError::Conflict`.
    pub fn create_user(
        &self,
        username: &str,
        full_name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, full_name, email, password) VALUES (?1, ?2, ?3, ?4)",
                params![username, full_name, email, password_hash],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }

    /// Look a user up by username or email.
    pub fn get_user_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1 OR email = ?1", &login))
    }

    /// Returns false when the user does not exist.
    pub fn set_online(&self, id: i64, online: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE users
                 SET is_online = ?2, last_seen = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?1",
                params![id, online],
            )?;
            Ok(affected > 0)
        })
    }

    /// Case-insensitive substring search over username, full name and email.
    ///
    /// Excludes `user_id` itself and every user sharing a friend link with
    /// `user_id` in either direction, whatever the link's status.
    pub fn search_unrelated_users(
        &self,
        user_id: i64,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ProfileRow>> {
        let pattern = contains_pattern(query);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.full_name, u.email, u.avatar_url
                 FROM users u
                 WHERE (unicode_lower(u.username) LIKE ?2 ESCAPE '\\'
                        OR unicode_lower(u.full_name) LIKE ?2 ESCAPE '\\'
                        OR unicode_lower(u.email) LIKE ?2 ESCAPE '\\')
                   AND u.id <> ?1
                   AND u.id NOT IN (
                       SELECT friend_id FROM friends WHERE user_id = ?1
                       UNION
                       SELECT user_id FROM friends WHERE friend_id = ?1
                   )
                 ORDER BY u.username
                 LIMIT ?3",
            )?;

            let rows = stmt
                .query_map(params![user_id, pattern, limit], row_to_profile)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user(
    conn: &Connection,
    condition: &str,
    value: &dyn rusqlite::ToSql,
) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row(&[value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            username: row.get(1)?,
            full_name: row.get(2)?,
            email: row.get(3)?,
            password: row.get(4)?,
            avatar_url: row.get(5)?,
            is_online: row.get(6)?,
            created_at: row.get(7)?,
        })
    })
    .optional()
}

pub(crate) fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        avatar_url: row.get(4)?,
    })
}
