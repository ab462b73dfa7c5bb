//! Owed/owing projection over the `user_balance` view.

use rusqlite::Connection;
use tally_db::queries::balances;
use tally_types::user::UserBalance;
use tally_types::UserId;

use crate::Result;

/// Balance of one active user.
pub fn for_user(conn: &Connection, user_id: UserId) -> Result<UserBalance> {
    Ok(balances::for_user(conn, user_id)?)
}

/// Every active user, highest net balance first.
pub fn all(conn: &Connection) -> Result<Vec<UserBalance>> {
    Ok(balances::all(conn)?)
}
