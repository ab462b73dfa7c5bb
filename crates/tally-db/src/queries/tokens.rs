//! Single-use verification token query functions.

use rusqlite::{Connection, Row};
use tally_types::auth::{TokenPurpose, VerificationToken};
use tally_types::TokenId;

use crate::{constraint, not_found, parse_column, Result};

fn map_row(row: &Row<'_>) -> rusqlite::Result<VerificationToken> {
    Ok(VerificationToken {
        token_id: row.get(0)?,
        user_id: row.get(1)?,
        purpose: parse_column(row, 2)?,
        expires_at: row.get::<_, i64>(3)? as u64,
        is_used: row.get(4)?,
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

/// Insert a new token under its digest.
pub fn insert(conn: &Connection, token: &VerificationToken, token_digest: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO verification_tokens
             (token_id, user_id, purpose, token_digest, expires_at, is_used, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            token.token_id,
            token.user_id,
            token.purpose.as_str(),
            token_digest,
            token.expires_at as i64,
            token.is_used,
            token.created_at as i64,
        ],
    )
    .map_err(constraint)?;
    Ok(())
}

/// Find a token by digest and purpose, used or not.
pub fn find(conn: &Connection, token_digest: &str, purpose: TokenPurpose) -> Result<VerificationToken> {
    conn.query_row(
        "SELECT token_id, user_id, purpose, expires_at, is_used, created_at
         FROM verification_tokens
         WHERE token_digest = ?1 AND purpose = ?2",
        rusqlite::params![token_digest, purpose.as_str()],
        map_row,
    )
    .map_err(not_found("token"))
}

/// Mark a token used. Returns false if it was already used, so two
/// concurrent redemptions cannot both succeed.
pub fn mark_used(conn: &Connection, token_id: TokenId) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE verification_tokens SET is_used = 1 WHERE token_id = ?1 AND is_used = 0",
        [token_id],
    )?;
    Ok(updated > 0)
}
