//! # tally-core
//!
//! Domain managers for the Tally service. Each operation takes an open
//! connection, the acting user where one applies, and the current time, so
//! nothing reads ambient state.
//!
//! - [`identity`]: registration, login, refresh rotation, password and
//!   email-verification flows, access-token checks
//! - [`users`]: user directory and profile maintenance
//! - [`social`]: friendship request lifecycle
//! - [`debts`]: debt lifecycle and aggregates
//! - [`payments`]: payment ledger and status recompute
//! - [`balances`]: per-user owed/owing projection

pub mod balances;
pub mod debts;
pub mod identity;
pub mod payments;
pub mod social;
pub mod users;

use tally_crypto::CryptoError;
use tally_db::DbError;

pub use identity::{Identity, IdentitySettings, PreparedUser};

/// Domain error taxonomy. The API layer maps each variant to one status
/// code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or self-referential input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Bad credentials or an invalid/expired token. Carries no detail.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but not a party to the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Valid request against a resource in the wrong state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Duplicate relationship or email.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected storage or crypto failure.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<DbError> for Error {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => Error::NotFound(what),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::from(DbError::Sqlite(e))
    }
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        Error::Internal(e.to_string())
    }
}

/// Reject strings longer than `max` characters.
pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::InvalidArgument(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Reject blank strings and strings longer than `max` characters.
pub(crate) fn check_required(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{field} is required")));
    }
    check_len(field, value, max)
}
