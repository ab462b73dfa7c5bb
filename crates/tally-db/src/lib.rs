//! # tally-db
//!
//! Persistence layer for the Tally service.
//! Manages a single SQLite database, `$TALLY_DATA_DIR/tally.db`.
//!
//! ## Schema
//!
//! - WAL mode, foreign keys enforced
//! - Ids are UUID blobs, money is integer cents, dates are ISO `YYYY-MM-DD`
//! - All timestamps are Unix epoch seconds (u64)
//! - Schema version stored in `PRAGMA user_version`
//! - `sum(payments) <= debt amount` is enforced by a trigger, not only by callers

pub mod migrations;
pub mod queries;
pub mod schema;

use std::error::Error as StdError;
use std::path::Path;
use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Row};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the Tally database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

/// Map `QueryReturnedNoRows` to [`DbError::NotFound`].
pub(crate) fn not_found(what: &'static str) -> impl Fn(rusqlite::Error) -> DbError {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what.into()),
        other => DbError::Sqlite(other),
    }
}

/// Map UNIQUE/CHECK/FOREIGN KEY/trigger failures to [`DbError::Constraint`].
pub(crate) fn constraint(e: rusqlite::Error) -> DbError {
    match e {
        rusqlite::Error::SqliteFailure(err, msg) if err.code == ErrorCode::ConstraintViolation => {
            DbError::Constraint(msg.unwrap_or_else(|| err.to_string()))
        }
        other => DbError::Sqlite(other),
    }
}

/// Read a TEXT column through `FromStr`.
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
pub(crate) mod testutil {
    use rusqlite::Connection;
    use tally_types::user::User;
    use uuid::Uuid;

    pub fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    pub fn new_user(first_name: &str, email: &str) -> User {
        User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "hash".into(),
            first_name: first_name.to_string(),
            last_name: "Test".into(),
            phone: None,
            is_active: true,
            email_verified: false,
            created_at: 100,
            updated_at: 100,
        }
    }

    /// Insert a fresh active user and return its id.
    pub fn seed_user(conn: &Connection, first_name: &str) -> Uuid {
        let user = new_user(first_name, &format!("{}@example.com", first_name.to_lowercase()));
        crate::queries::users::insert(conn, &user).expect("seed user");
        user.user_id
    }
}
