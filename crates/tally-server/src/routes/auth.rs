//! `/api/auth`: registration, sessions, passwords and email verification.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tally_cache::keys;
use tally_core::users;
use tally_types::auth::AuthTokens;
use tally_types::unix_now;
use tally_types::user::UserProfile;
use tracing::info;

use crate::auth::CurrentUser;
use crate::blocking::blocking;
use crate::cached::{invalidate, invalidate_user, read_through};
use crate::dto::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MessageResponse,
    RefreshTokenRequest, RegisterRequest, ResetPasswordRequest, TokenRequest, ValidJson,
    ValidResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/verify-email", post(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/validate-token", post(validate_token))
        .route("/me", get(me))
}

/// Create the account and log it in.
async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthTokens>)> {
    let identity = state.identity.clone();
    let prepared = blocking(move || identity.prepare_user(req.into())).await?;

    let now = unix_now();
    let tokens = {
        let conn = state.db.lock().await;
        let user = state.identity.insert_user(&conn, prepared, now)?;
        state.identity.start_session(&conn, user.user_id, now)?
    };
    invalidate(
        &state,
        &[
            keys::ALL_ACTIVE_USERS.to_string(),
            keys::ALL_USER_BALANCES.to_string(),
        ],
    )
    .await;
    Ok((StatusCode::CREATED, Json(tokens)))
}

async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<Json<AuthTokens>> {
    let candidate = {
        let conn = state.db.lock().await;
        state.identity.login_candidate(&conn, &req.email)?
    };
    let identity = state.identity.clone();
    let user = blocking(move || identity.check_credentials(candidate, &req.password)).await?;

    let conn = state.db.lock().await;
    let tokens = state.identity.start_session(&conn, user.user_id, unix_now())?;
    Ok(Json(tokens))
}

async fn refresh_token(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RefreshTokenRequest>,
) -> ApiResult<Json<AuthTokens>> {
    let mut conn = state.db.lock().await;
    let tokens = state
        .identity
        .refresh(&mut conn, &req.refresh_token, unix_now())?;
    Ok(Json(tokens))
}

/// Close the caller's session holding the given refresh token.
async fn logout(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidJson(req): ValidJson<RefreshTokenRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let conn = state.db.lock().await;
    if !state
        .identity
        .logout(&conn, caller.user_id, &req.refresh_token)?
    {
        return Err(ApiError::invalid_argument("no active session for this token"));
    }
    Ok(Json(MessageResponse::new("logged out")))
}

/// The stored hash is read, checked and replaced under separate locks;
/// the swap refuses if another change landed in between.
async fn change_password(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let stored = {
        let conn = state.db.lock().await;
        state.identity.stored_password_hash(&conn, caller.user_id)?
    };
    let identity = state.identity.clone();
    let expected = stored.clone();
    let hash = blocking(move || {
        identity.prepare_password_change(&stored, &req.current_password, &req.new_password)
    })
    .await?;

    let mut conn = state.db.lock().await;
    state
        .identity
        .store_password(&mut conn, caller.user_id, &expected, &hash, unix_now())?;
    Ok(Json(MessageResponse::new("password changed")))
}

/// Always 200 so the response does not reveal whether the email exists.
/// The token goes to the mail collaborator, never back to the client.
async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let conn = state.db.lock().await;
    if state
        .identity
        .forgot_password(&conn, &req.email, unix_now())?
        .is_some()
    {
        info!("password reset token issued");
    }
    Ok(Json(MessageResponse::new(
        "if the email is registered, a reset link has been sent",
    )))
}

async fn reset_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let identity = state.identity.clone();
    let new_password = req.new_password;
    let hash = blocking(move || identity.hash_new_password(&new_password)).await?;

    let mut conn = state.db.lock().await;
    state
        .identity
        .reset_password_hashed(&mut conn, &req.token, &req.email, &hash, unix_now())?;
    Ok(Json(MessageResponse::new("password has been reset")))
}

async fn verify_email(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidJson(req): ValidJson<TokenRequest>,
) -> ApiResult<Json<MessageResponse>> {
    {
        let mut conn = state.db.lock().await;
        state
            .identity
            .verify_email(&mut conn, &req.token, caller.user_id, unix_now())?;
    }
    invalidate_user(&state, caller.user_id, &caller.email).await;
    Ok(Json(MessageResponse::new("email verified")))
}

async fn resend_verification(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    let conn = state.db.lock().await;
    state
        .identity
        .resend_verification(&conn, caller.user_id, unix_now())?;
    info!(user_id = %caller.user_id, "verification token issued");
    Ok(Json(MessageResponse::new("verification email sent")))
}

async fn validate_token(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<TokenRequest>,
) -> Json<ValidResponse> {
    Json(ValidResponse {
        valid: state.identity.validate_token(&req.token, unix_now()),
    })
}

async fn me(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<UserProfile>> {
    let key = keys::user_by_id(caller.user_id);
    let profile = read_through(&state, &key, state.user_ttl, |conn| {
        users::get(conn, caller.user_id)
    })
    .await?;
    Ok(Json(profile))
}
