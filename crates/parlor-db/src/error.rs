use rusqlite::ffi;
use thiserror::Error;

/// Errors produced by the store layer.
///
/// Constraint violations are split out of the generic SQLite error so callers
/// can report duplicates and dangling references without string matching.
#[derive(Error, Debug)]
pub enum DbError {
    /// Any SQLite failure that is not a classified constraint violation.
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// A FOREIGN KEY constraint rejected the write.
    #[error("Referenced row does not exist: {0}")]
    MissingReference(String),

    #[error("DB lock poisoned: {0}")]
    LockPoisoned(String),

    /// A stored value could not be interpreted.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        let (code, detail) = match &err {
            rusqlite::Error::SqliteFailure(e, msg) => (
                e.extended_code,
                msg.clone().unwrap_or_else(|| e.to_string()),
            ),
            _ => return Self::Sqlite(err),
        };

        match code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                Self::Conflict(detail)
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Self::MissingReference(detail),
            _ => Self::Sqlite(err),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DbError>;
