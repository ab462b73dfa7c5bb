//! Read-through caching of user and balance lookups.
//!
//! The cache only saves latency. A cache error is logged at `warn` and
//! treated as a miss, and every write path drops the keys it may have made
//! stale.

use std::time::Duration;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tally_cache::{get_json, keys, set_json};
use tally_types::debt::Debt;
use tally_types::UserId;
use tracing::{debug, warn};

use crate::error::ApiResult;
use crate::state::AppState;

/// Return the cached value under `key`, or load it from the database and
/// cache it for `ttl`.
///
/// The connection stays locked until the fill is stored. Writers invalidate
/// only after their own lock is released, so a fill is either fresh or
/// dropped by the invalidation that follows it.
pub async fn read_through<T, F>(state: &AppState, key: &str, ttl: Duration, load: F) -> ApiResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&Connection) -> tally_core::Result<T>,
{
    match get_json::<T, _>(state.cache.as_ref(), key).await {
        Ok(Some(value)) => {
            debug!(key, "cache hit");
            return Ok(value);
        }
        Ok(None) => {}
        Err(e) => warn!(key, error = %e, "cache read failed"),
    }

    let conn = state.db.lock().await;
    let value = load(&conn)?;
    if let Err(e) = set_json(state.cache.as_ref(), key, &value, Some(ttl)).await {
        warn!(key, error = %e, "cache write failed");
    }
    drop(conn);
    Ok(value)
}

/// Drop `keys`. Failures are logged and otherwise ignored.
pub async fn invalidate(state: &AppState, keys: &[String]) {
    for key in keys {
        if let Err(e) = state.cache.delete(key).await {
            warn!(key = %key, error = %e, "cache invalidation failed");
        }
    }
}

/// After a debt or payment write: both parties' balances and the full list.
pub async fn invalidate_balances(state: &AppState, parties: &[UserId]) {
    let mut stale: Vec<String> = parties.iter().map(|id| keys::user_balance(*id)).collect();
    stale.push(keys::ALL_USER_BALANCES.to_string());
    invalidate(state, &stale).await;
}

/// After a write to `debt` or one of its payments.
pub async fn invalidate_debt(state: &AppState, debt: &Debt) {
    invalidate_balances(state, &[debt.creditor_id, debt.debtor_id]).await;
}

/// After a profile change, deactivation or deletion.
pub async fn invalidate_user(state: &AppState, user_id: UserId, email: &str) {
    invalidate(
        state,
        &[
            keys::user_by_id(user_id),
            keys::user_by_email(email),
            keys::ALL_ACTIVE_USERS.to_string(),
        ],
    )
    .await;
    invalidate_balances(state, &[user_id]).await;
}
