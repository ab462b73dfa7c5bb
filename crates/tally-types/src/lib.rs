//! # tally-types
//!
//! Shared domain types used across the Tally workspace.
//!
//! - [`money`]: fixed-point currency amounts
//! - [`user`]: users, profiles, balances
//! - [`auth`]: authenticated caller, sessions, single-use tokens
//! - [`friendship`]: friendship requests and friend projections
//! - [`debt`]: debts, patches, summaries
//! - [`payment`]: payments recorded against debts
//!
//! All timestamps are Unix epoch seconds (`u64`).

pub mod auth;
pub mod debt;
pub mod friendship;
pub mod money;
pub mod payment;
pub mod user;

use chrono::{DateTime, NaiveDate};
use uuid::Uuid;

pub use money::Money;

/// Common id aliases.
pub type UserId = Uuid;
pub type SessionId = Uuid;
pub type TokenId = Uuid;
pub type FriendshipId = Uuid;
pub type DebtId = Uuid;
pub type PaymentId = Uuid;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Maximum email length.
pub const MAX_EMAIL_LEN: usize = 100;

/// Maximum first/last name length.
pub const MAX_NAME_LEN: usize = 50;

/// Maximum phone number length.
pub const MAX_PHONE_LEN: usize = 20;

/// Maximum debt description length.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Maximum payment method length.
pub const MAX_PAYMENT_METHOD_LEN: usize = 50;

/// Maximum payment notes length.
pub const MAX_NOTES_LEN: usize = 500;

/// Seconds in one day.
pub const SECS_PER_DAY: u64 = 86_400;

/// Errors raised while parsing or converting shared types.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, TypesError>;

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The UTC calendar date containing `now`.
pub fn date_of(now: u64) -> NaiveDate {
    DateTime::from_timestamp(now as i64, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_of_epoch() {
        assert_eq!(date_of(0), NaiveDate::from_ymd_opt(1970, 1, 1).expect("date"));
    }

    #[test]
    fn test_date_of_rolls_at_midnight_utc() {
        // 2023-11-14T22:13:20Z
        let now = 1_700_000_000;
        assert_eq!(date_of(now), NaiveDate::from_ymd_opt(2023, 11, 14).expect("date"));
        let later = now + 2 * 3600;
        assert_eq!(date_of(later), NaiveDate::from_ymd_opt(2023, 11, 15).expect("date"));
    }
}
