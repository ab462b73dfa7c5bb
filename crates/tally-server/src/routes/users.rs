//! `/api/users`: directory, own profile and balances.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use tally_cache::keys;
use tally_core::debts::DebtView;
use tally_core::{balances, debts, users};
use tally_types::user::{ProfilePatch, UserBalance, UserProfile};
use tally_types::{unix_now, UserId};

use crate::auth::CurrentUser;
use crate::cached::{invalidate_balances, invalidate_user, read_through};
use crate::dto::{MessageResponse, UpdateProfileRequest, ValidJson};
use crate::error::ApiResult;
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route(
            "/profile",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/profile/deactivate", patch(deactivate_profile))
        .route("/balance", get(own_balance))
        .route("/balances", get(all_balances))
        .route("/:id", get(get_user))
}

async fn list_users(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let users = read_through(&state, keys::ALL_ACTIVE_USERS, state.user_ttl, users::list_active)
        .await?;
    Ok(Json(users))
}

async fn get_user(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<UserProfile>> {
    let profile = read_through(&state, &keys::user_by_id(user_id), state.user_ttl, |conn| {
        users::get(conn, user_id)
    })
    .await?;
    Ok(Json(profile))
}

async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<UserProfile>> {
    get_user(State(state), CurrentUser(caller.clone()), Path(caller.user_id)).await
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let patch = ProfilePatch::from(req);
    let profile = {
        let conn = state.db.lock().await;
        users::update_profile(&conn, &caller, &patch, unix_now())?
    };
    invalidate_user(&state, caller.user_id, &caller.email).await;
    Ok(Json(profile))
}

/// Delete the caller's account and everything that cascades from it.
async fn delete_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<StatusCode> {
    let counterparts: Vec<UserId> = {
        let conn = state.db.lock().await;
        let involved = debts::list(&conn, &caller, DebtView::All, unix_now())?;
        users::delete(&conn, caller.user_id)?;
        involved
            .iter()
            .map(|debt| {
                if debt.creditor_id == caller.user_id {
                    debt.debtor_id
                } else {
                    debt.creditor_id
                }
            })
            .collect()
    };
    invalidate_user(&state, caller.user_id, &caller.email).await;
    invalidate_balances(&state, &counterparts).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn deactivate_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    {
        let mut conn = state.db.lock().await;
        users::deactivate(&mut conn, caller.user_id, unix_now())?;
    }
    invalidate_user(&state, caller.user_id, &caller.email).await;
    Ok(Json(MessageResponse::new("account deactivated")))
}

async fn own_balance(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<UserBalance>> {
    let key = keys::user_balance(caller.user_id);
    let balance = read_through(&state, &key, state.balance_ttl, |conn| {
        balances::for_user(conn, caller.user_id)
    })
    .await?;
    Ok(Json(balance))
}

async fn all_balances(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> ApiResult<Json<Vec<UserBalance>>> {
    let all = read_through(&state, keys::ALL_USER_BALANCES, state.balance_ttl, balances::all)
        .await?;
    Ok(Json(all))
}
