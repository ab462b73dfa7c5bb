//! Refresh session query functions.
//!
//! Sessions are looked up by the digest of their refresh token and are only
//! ever deactivated, never deleted.

use rusqlite::{Connection, Row};
use tally_types::auth::Session;
use tally_types::{SessionId, UserId};

use crate::{constraint, not_found, Result};

fn map_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        expires_at: row.get::<_, i64>(2)? as u64,
        is_active: row.get(3)?,
        created_at: row.get::<_, i64>(4)? as u64,
    })
}

/// Insert a new active session.
pub fn insert(conn: &Connection, session: &Session, token_digest: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (session_id, user_id, refresh_token_digest, expires_at, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            session.session_id,
            session.user_id,
            token_digest,
            session.expires_at as i64,
            session.is_active,
            session.created_at as i64,
        ],
    )
    .map_err(constraint)?;
    Ok(())
}

/// Find the active, unexpired session holding this token digest.
pub fn find_active(conn: &Connection, token_digest: &str, now: u64) -> Result<Session> {
    conn.query_row(
        "SELECT session_id, user_id, expires_at, is_active, created_at
         FROM sessions
         WHERE refresh_token_digest = ?1 AND is_active = 1 AND expires_at > ?2",
        rusqlite::params![token_digest, now as i64],
        map_row,
    )
    .map_err(not_found("session"))
}

/// Deactivate one session. Returns false if it was already inactive.
pub fn deactivate(conn: &Connection, session_id: SessionId) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE sessions SET is_active = 0 WHERE session_id = ?1 AND is_active = 1",
        [session_id],
    )?;
    Ok(updated > 0)
}

/// Deactivate the user's active session for this token digest.
/// Returns false if there was none.
pub fn deactivate_by_token(conn: &Connection, user_id: UserId, token_digest: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE sessions SET is_active = 0
         WHERE user_id = ?1 AND refresh_token_digest = ?2 AND is_active = 1",
        rusqlite::params![user_id, token_digest],
    )?;
    Ok(updated > 0)
}

/// Deactivate every active session of a user. Returns how many were closed.
pub fn deactivate_all(conn: &Connection, user_id: UserId) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE sessions SET is_active = 0 WHERE user_id = ?1 AND is_active = 1",
        [user_id],
    )?;
    Ok(updated)
}

/// Active, unexpired sessions of a user, newest first.
pub fn list_active(conn: &Connection, user_id: UserId, now: u64) -> Result<Vec<Session>> {
    let mut stmt = conn.prepare(
        "SELECT session_id, user_id, expires_at, is_active, created_at
         FROM sessions
         WHERE user_id = ?1 AND is_active = 1 AND expires_at > ?2
         ORDER BY created_at DESC",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, now as i64], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
