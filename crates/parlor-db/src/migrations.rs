use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub const LATEST_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                full_name   TEXT NOT NULL DEFAULT '',
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                avatar_url  TEXT,
                is_online   INTEGER NOT NULL DEFAULT 0,
                last_seen   TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE rooms (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE COLLATE NOCASE,
                description TEXT NOT NULL DEFAULT '',
                is_private  INTEGER NOT NULL DEFAULT 0,
                created_by  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE room_members (
                room_id     INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role        TEXT NOT NULL DEFAULT 'member' CHECK (role IN ('admin', 'member')),
                joined_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                PRIMARY KEY (room_id, user_id)
            );

            CREATE INDEX idx_room_members_user ON room_members(user_id);

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id         INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message_text    TEXT NOT NULL CHECK (length(message_text) > 0),
                message_type    TEXT NOT NULL DEFAULT 'text'
                                CHECK (message_type IN ('text', 'image', 'file')),
                is_edited       INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_messages_room ON messages(room_id, created_at);

            CREATE TABLE friends (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                friend_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status          TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'accepted', 'declined', 'blocked')),
                requested_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                accepted_at     TEXT,
                CHECK (user_id <> friend_id)
            );

            -- One row per unordered pair, whichever side requested
            CREATE UNIQUE INDEX idx_friends_pair
                ON friends(MIN(user_id, friend_id), MAX(user_id, friend_id));

            CREATE INDEX idx_friends_friend ON friends(friend_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
