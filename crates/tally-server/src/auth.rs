//! Bearer-token authentication.
//!
//! Protected handlers take a [`CurrentUser`]. The extractor reads
//! `Authorization: Bearer <token>` and resolves it through
//! [`tally_core::Identity::authenticate`], so the caller's identity is an
//! explicit handler argument rather than ambient request state.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tally_core::Error;
use tally_types::auth::AuthenticatedUser;
use tally_types::unix_now;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller of a request.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthenticatedUser);

/// The token part of a `Bearer` authorization header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Domain(Error::Unauthorized))?;
        let user = state.identity.authenticate(token, unix_now())?;
        Ok(CurrentUser(user))
    }
}
