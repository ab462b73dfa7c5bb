//! User directory. Reads return [`UserProfile`], never the stored hash.

use rusqlite::{Connection, TransactionBehavior};
use tally_db::queries::{sessions, users};
use tally_types::auth::AuthenticatedUser;
use tally_types::user::{ProfilePatch, UserProfile};
use tally_types::{UserId, MAX_NAME_LEN, MAX_PHONE_LEN};
use tracing::info;

use crate::{check_len, check_required, Error, Result};

/// An active user by id.
pub fn get(conn: &Connection, user_id: UserId) -> Result<UserProfile> {
    let user = users::get(conn, user_id)?;
    if !user.is_active {
        return Err(Error::NotFound("user".into()));
    }
    Ok(user.profile())
}

/// An active user by email, case-insensitively.
pub fn get_by_email(conn: &Connection, email: &str) -> Result<UserProfile> {
    users::find_active_by_email(conn, email)?
        .map(|user| user.profile())
        .ok_or_else(|| Error::NotFound("user".into()))
}

/// Every active user, ordered by first then last name.
pub fn list_active(conn: &Connection) -> Result<Vec<UserProfile>> {
    Ok(users::list_active(conn)?
        .iter()
        .map(|user| user.profile())
        .collect())
}

/// Merge `patch` into the caller's profile.
pub fn update_profile(
    conn: &Connection,
    caller: &AuthenticatedUser,
    patch: &ProfilePatch,
    now: u64,
) -> Result<UserProfile> {
    if let Some(first_name) = &patch.first_name {
        check_required("first name", first_name, MAX_NAME_LEN)?;
    }
    if let Some(last_name) = &patch.last_name {
        check_required("last name", last_name, MAX_NAME_LEN)?;
    }
    if let Some(phone) = &patch.phone {
        check_len("phone", phone, MAX_PHONE_LEN)?;
    }

    let mut user = users::get(conn, caller.user_id)?;
    if !user.is_active {
        return Err(Error::NotFound("user".into()));
    }
    patch.apply(&mut user);
    user.updated_at = now;
    users::update_profile(conn, &user)?;

    info!(user_id = %user.user_id, "profile updated");
    Ok(user.profile())
}

/// Deactivate a user and close all of their sessions.
pub fn deactivate(conn: &mut Connection, user_id: UserId, now: u64) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    users::set_active(&tx, user_id, false, now)?;
    let closed = sessions::deactivate_all(&tx, user_id)?;
    tx.commit()?;

    info!(user_id = %user_id, sessions_closed = closed, "user deactivated");
    Ok(())
}

pub fn activate(conn: &Connection, user_id: UserId, now: u64) -> Result<()> {
    users::set_active(conn, user_id, true, now)?;
    info!(user_id = %user_id, "user activated");
    Ok(())
}

/// Hard delete. Everything the user owns or is a party to goes with it.
pub fn delete(conn: &Connection, user_id: UserId) -> Result<()> {
    users::delete(conn, user_id)?;
    info!(user_id = %user_id, "user deleted");
    Ok(())
}

/// True for an active user.
pub fn exists(conn: &Connection, user_id: UserId) -> Result<bool> {
    Ok(users::exists(conn, user_id)?)
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool> {
    Ok(users::email_exists(conn, email)?)
}
