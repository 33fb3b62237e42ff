use parlor_types::models::FriendStatus;
use rusqlite::params;

use crate::models::{FriendLinkRow, ProfileRow};
use crate::users::row_to_profile;
use crate::{Database, OptionalExt, Result};

impl Database {
    /// Record a link from `user_id` to `friend_id`.
    ///
    /// At most one link may exist per unordered pair; a second one in either
    /// direction surfaces as `DbError::Conflict`. `accepted_at` is stamped
    /// when the link is created already accepted.
    pub fn insert_friend_link(
        &self,
        user_id: i64,
        friend_id: i64,
        status: FriendStatus,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO friends (user_id, friend_id, status, accepted_at)
                 VALUES (?1, ?2, ?3,
                         CASE WHEN ?3 = 'accepted' THEN strftime('%Y-%m-%d %H:%M:%f', 'now') END)",
                params![user_id, friend_id, status.as_str()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// The link between two users, whichever of them created it.
    pub fn get_friend_link(&self, a: i64, b: i64) -> Result<Option<FriendLinkRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, friend_id, status, requested_at, accepted_at
                 FROM friends
                 WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
                params![a, b],
                |row| {
                    Ok(FriendLinkRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        friend_id: row.get(2)?,
                        status: row.get(3)?,
                        requested_at: row.get(4)?,
                        accepted_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Accepted friends of `user_id` in either direction, by username.
    pub fn list_friends(&self, user_id: i64) -> Result<Vec<ProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.full_name, u.email, u.avatar_url
                 FROM friends f
                 JOIN users u
                   ON u.id = CASE WHEN f.user_id = ?1 THEN f.friend_id ELSE f.user_id END
                 WHERE (f.user_id = ?1 OR f.friend_id = ?1) AND f.status = 'accepted'
                 ORDER BY u.username",
            )?;

            let rows = stmt
                .query_map([user_id], row_to_profile)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;

    fn with_users(names: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for name in names {
            db.create_user(name, "", &format!("{name}@example.com"), "x")
                .unwrap();
        }
        db
    }

    #[test]
    fn one_link_per_pair_in_either_direction() {
        let db = with_users(&["alice", "bob"]);
        db.insert_friend_link(1, 2, FriendStatus::Accepted).unwrap();

        let same = db.insert_friend_link(1, 2, FriendStatus::Accepted);
        assert!(matches!(same, Err(DbError::Conflict(_))));
        let reverse = db.insert_friend_link(2, 1, FriendStatus::Pending);
        assert!(matches!(reverse, Err(DbError::Conflict(_))));
    }

    #[test]
    fn link_to_self_or_unknown_user_is_rejected() {
        let db = with_users(&["alice"]);
        assert!(db.insert_friend_link(1, 1, FriendStatus::Accepted).is_err());
        let missing = db.insert_friend_link(1, 9, FriendStatus::Accepted);
        assert!(matches!(missing, Err(DbError::MissingReference(_))));
    }

    #[test]
    fn listing_is_symmetric_and_accepted_only() {
        let db = with_users(&["alice", "bob", "carol", "dave"]);
        db.insert_friend_link(1, 3, FriendStatus::Accepted).unwrap();
        db.insert_friend_link(2, 1, FriendStatus::Accepted).unwrap();
        db.insert_friend_link(1, 4, FriendStatus::Pending).unwrap();

        let names = |id| -> Vec<String> {
            db.list_friends(id)
                .unwrap()
                .into_iter()
                .map(|p| p.username)
                .collect()
        };
        assert_eq!(names(1), vec!["bob", "carol"]);
        assert_eq!(names(2), vec!["alice"]);
        assert!(names(4).is_empty());
    }

    #[test]
    fn accepted_links_are_stamped() {
        let db = with_users(&["alice", "bob", "carol"]);
        db.insert_friend_link(1, 2, FriendStatus::Accepted).unwrap();
        db.insert_friend_link(3, 1, FriendStatus::Pending).unwrap();

        let accepted = db.get_friend_link(2, 1).unwrap().unwrap();
        assert_eq!(accepted.user_id, 1);
        assert_eq!(accepted.status, "accepted");
        assert!(accepted.accepted_at.is_some());

        let pending = db.get_friend_link(1, 3).unwrap().unwrap();
        assert!(pending.accepted_at.is_none());
        assert!(db.get_friend_link(2, 3).unwrap().is_none());
    }

    #[test]
    fn search_skips_linked_users() {
        let db = with_users(&["alice", "alina", "alf"]);
        db.insert_friend_link(2, 1, FriendStatus::Pending).unwrap();

        let found: Vec<_> = db
            .search_unrelated_users(1, "al", 10)
            .unwrap()
            .into_iter()
            .map(|p| p.username)
            .collect();
        assert_eq!(found, vec!["alf"]);
    }
}
