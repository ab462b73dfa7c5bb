//! # tally-crypto
//!
//! Credential primitives for the Tally service.
//!
//! ## Modules
//!
//! - [`password`]: Argon2id password hashing (PHC strings, tunable cost)
//! - [`token`]: Opaque random tokens and their domain-separated BLAKE3 digests
//! - [`jwt`]: HS256 access tokens with issuer, audience and expiry checks

pub mod jwt;
pub mod password;
pub mod token;

/// Error types for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Password hashing failed or a stored hash could not be parsed.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    /// Signing secret shorter than the minimum.
    #[error("invalid key length: expected at least {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Access token could not be signed.
    #[error("token signing failed: {0}")]
    TokenSigning(String),

    /// Access token signature, issuer, audience or shape is wrong.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Access token is past its expiry.
    #[error("token expired")]
    TokenExpired,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
