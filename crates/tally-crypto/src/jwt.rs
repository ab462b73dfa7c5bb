//! HS256 access tokens.
//!
//! Expiry is checked against a caller-supplied clock with zero leeway, so
//! validation is deterministic under test. Issuer and audience are checked
//! by `jsonwebtoken` itself.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CryptoError, Result};

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Claims carried by an access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the user id.
    pub sub: Uuid,
    pub email: String,
    /// Display name, "First Last".
    pub name: String,
    pub email_verified: bool,
    pub iss: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

/// Identity fields to embed in a new token.
#[derive(Clone, Debug)]
pub struct Subject<'a> {
    pub user_id: Uuid,
    pub email: &'a str,
    pub name: &'a str,
    pub email_verified: bool,
}

/// Issues and validates access tokens under one secret, issuer and audience.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if `secret` is shorter than
    /// [`MIN_SECRET_LEN`].
    pub fn new(secret: &[u8], issuer: &str, audience: &str, ttl_secs: u64) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: MIN_SECRET_LEN,
                actual: secret.len(),
            });
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl_secs,
        })
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Sign a token for `subject` valid from `now` for the configured TTL.
    ///
    /// Returns the token and its expiry.
    pub fn issue(&self, subject: &Subject<'_>, now: u64) -> Result<(String, u64)> {
        let exp = now + self.ttl_secs;
        let claims = AccessClaims {
            sub: subject.user_id,
            email: subject.email.to_string(),
            name: subject.name.to_string(),
            email_verified: subject.email_verified,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CryptoError::TokenSigning(e.to_string()))?;
        Ok((token, exp))
    }

    /// Check signature, issuer, audience and expiry.
    ///
    /// A token is expired once `now >= exp`.
    pub fn validate(&self, token: &str, now: u64) -> Result<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<AccessClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => CryptoError::TokenExpired,
                _ => CryptoError::InvalidToken(e.to_string()),
            }
        })?;

        if now >= data.claims.exp {
            return Err(CryptoError::TokenExpired);
        }
        Ok(data.claims)
    }
}
