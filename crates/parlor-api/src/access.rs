//! Who may read and write a room's messages.
//!
//! A room is open to anyone when public and to its members when private.
//! The decision is made fresh on every call from a single store read.

use parlor_db::Database;
use parlor_db::models::RoomAccessRow;

use crate::error::{ApiError, ApiResult};

pub fn grants_access(room: Option<&RoomAccessRow>) -> bool {
    match room {
        Some(room) => !room.is_private || room.role.is_some(),
        None => false,
    }
}

/// False for unknown rooms as well as for private rooms without membership.
pub fn can_access(db: &Database, user_id: i64, room_id: i64) -> ApiResult<bool> {
    let room = db.room_access(room_id, user_id)?;
    Ok(grants_access(room.as_ref()))
}

pub fn ensure_access(db: &Database, user_id: i64, room_id: i64) -> ApiResult<()> {
    if can_access(db, user_id, room_id)? {
        Ok(())
    } else {
        Err(ApiError::AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(is_private: bool, role: Option<&str>) -> RoomAccessRow {
        RoomAccessRow {
            is_private,
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn decision_table() {
        assert!(grants_access(Some(&row(false, None))));
        assert!(grants_access(Some(&row(false, Some("member")))));
        assert!(grants_access(Some(&row(true, Some("admin")))));
        assert!(!grants_access(Some(&row(true, None))));
        assert!(!grants_access(None));
    }

    #[test]
    fn public_open_private_members_only() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("owner", "", "owner@example.com", "x").unwrap();
        db.create_user("guest", "", "guest@example.com", "x").unwrap();
        let general = db.create_room_with_admin("General", "", false, 1).unwrap();
        let secret = db.create_room_with_admin("Secret", "", true, 1).unwrap();

        assert!(can_access(&db, 2, general).unwrap());
        assert!(!can_access(&db, 2, secret).unwrap());
        assert!(can_access(&db, 1, secret).unwrap());
        assert!(!can_access(&db, 1, 999).unwrap());

        assert!(matches!(
            ensure_access(&db, 2, secret),
            Err(ApiError::AccessDenied)
        ));
    }
}
