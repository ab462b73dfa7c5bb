//! Cache key scheme.

use std::time::Duration;

use uuid::Uuid;

/// Every active user.
pub const ALL_ACTIVE_USERS: &str = "all_active_users";

/// Every active user's balance.
pub const ALL_USER_BALANCES: &str = "all_user_balances";

/// Default TTL for user entries.
pub const USER_TTL: Duration = Duration::from_secs(30 * 60);

/// Default TTL for balance entries.
pub const BALANCE_TTL: Duration = Duration::from_secs(15 * 60);

pub fn user_by_id(user_id: Uuid) -> String {
    format!("user_by_id_{user_id}")
}

pub fn user_by_email(email: &str) -> String {
    format!("user_by_email_{}", email.trim().to_lowercase())
}

pub fn user_balance(user_id: Uuid) -> String {
    format!("user_balance_{user_id}")
}
