//! Authentication types: the authenticated caller, sessions and
//! single-use verification tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::user::{User, UserProfile};
use crate::{SessionId, TokenId, TypesError, UserId};

/// The identity carried by a validated access token.
///
/// Passed explicitly into every domain operation that acts on behalf of a
/// user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub email_verified: bool,
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email.clone(),
            display_name: user.display_name(),
            email_verified: user.email_verified,
        }
    }
}

/// A server-side refresh session. The refresh token itself is only stored
/// as a digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub expires_at: u64,
    pub is_active: bool,
    pub created_at: u64,
}

/// What a verification token may be redeemed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenPurpose {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email_verification" => Ok(TokenPurpose::EmailVerification),
            "password_reset" => Ok(TokenPurpose::PasswordReset),
            other => Err(TypesError::UnknownVariant {
                kind: "token purpose",
                value: other.to_string(),
            }),
        }
    }
}

/// A single-use email verification or password reset token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationToken {
    pub token_id: TokenId,
    pub user_id: UserId,
    pub purpose: TokenPurpose,
    pub expires_at: u64,
    pub is_used: bool,
    pub created_at: u64,
}

impl VerificationToken {
    /// Unused and not yet expired.
    pub fn is_redeemable(&self, now: u64) -> bool {
        !self.is_used && now < self.expires_at
    }
}

/// Tokens handed out by a successful login or refresh.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub access_token_expires_at: u64,
    pub refresh_token: String,
    pub refresh_token_expires_at: u64,
    pub user: UserProfile,
}
