//! User query functions.

use rusqlite::{Connection, OptionalExtension, Row};
use tally_types::user::User;
use tally_types::UserId;

use crate::{constraint, not_found, DbError, Result};

const COLUMNS: &str = "user_id, email, password_hash, first_name, last_name, phone, \
                       is_active, email_verified, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        phone: row.get(5)?,
        is_active: row.get(6)?,
        email_verified: row.get(7)?,
        created_at: row.get::<_, i64>(8)? as u64,
        updated_at: row.get::<_, i64>(9)? as u64,
    })
}

/// Emails are stored and compared lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Insert a new user. A duplicate email is a [`DbError::Constraint`].
pub fn insert(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (user_id, email, password_hash, first_name, last_name, phone,
                            is_active, email_verified, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            user.user_id,
            normalize_email(&user.email),
            user.password_hash,
            user.first_name,
            user.last_name,
            user.phone,
            user.is_active,
            user.email_verified,
            user.created_at as i64,
            user.updated_at as i64,
        ],
    )
    .map_err(constraint)?;
    Ok(())
}

/// Get a user by id, active or not.
pub fn get(conn: &Connection, user_id: UserId) -> Result<User> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE user_id = ?1"),
        [user_id],
        map_row,
    )
    .map_err(not_found("user"))
}

/// Get a user by email, case-insensitively, active or not.
pub fn get_by_email(conn: &Connection, email: &str) -> Result<User> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE email = ?1"),
        [normalize_email(email)],
        map_row,
    )
    .map_err(not_found("user"))
}

/// Get an active user by email, if any.
pub fn find_active_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE email = ?1 AND is_active = 1"),
            [normalize_email(email)],
            map_row,
        )
        .optional()?;
    Ok(user)
}

/// All active users ordered by first then last name.
pub fn list_active(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM users WHERE is_active = 1 ORDER BY first_name, last_name"
    ))?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Persist the profile fields (names, phone) and `updated_at` of `user`.
pub fn update_profile(conn: &Connection, user: &User) -> Result<()> {
    let updated = conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, phone = ?3, updated_at = ?4
         WHERE user_id = ?5",
        rusqlite::params![
            user.first_name,
            user.last_name,
            user.phone,
            user.updated_at as i64,
            user.user_id,
        ],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound("user".into()));
    }
    Ok(())
}

/// Replace the password hash.
pub fn update_password(conn: &Connection, user_id: UserId, hash: &str, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE user_id = ?3",
        rusqlite::params![hash, now as i64, user_id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound("user".into()));
    }
    Ok(())
}

/// Activate or deactivate a user.
pub fn set_active(conn: &Connection, user_id: UserId, active: bool, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE user_id = ?3",
        rusqlite::params![active, now as i64, user_id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound("user".into()));
    }
    Ok(())
}

/// Set the email-verified flag.
pub fn set_email_verified(conn: &Connection, user_id: UserId, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE users SET email_verified = 1, updated_at = ?1 WHERE user_id = ?2",
        rusqlite::params![now as i64, user_id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound("user".into()));
    }
    Ok(())
}

/// Hard-delete a user. Sessions, tokens, friendships, debts and payments
/// cascade.
pub fn delete(conn: &Connection, user_id: UserId) -> Result<()> {
    let deleted = conn.execute("DELETE FROM users WHERE user_id = ?1", [user_id])?;
    if deleted == 0 {
        return Err(DbError::NotFound("user".into()));
    }
    Ok(())
}

/// True if an active user with this id exists.
pub fn exists(conn: &Connection, user_id: UserId) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1 AND is_active = 1)",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// True if any user, active or not, holds this email.
pub fn email_exists(conn: &Connection, email: &str) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [normalize_email(email)],
        |row| row.get(0),
    )?;
    Ok(found)
}
