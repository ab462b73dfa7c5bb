//! `/api/debts`: the debt lifecycle and the caller's aggregates.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use tally_core::debts::{self, DebtView};
use tally_types::debt::{Debt, DebtDetails, DebtPatch, DebtSummary};
use tally_types::{unix_now, DebtId};

use crate::auth::CurrentUser;
use crate::cached::invalidate_debt;
use crate::dto::{CreateDebtRequest, TotalResponse, UpdateDebtRequest, ValidJson};
use crate::error::ApiResult;
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_debt))
        .route("/as-creditor", get(list_as_creditor))
        .route("/as-debtor", get(list_as_debtor))
        .route("/pending", get(list_pending))
        .route("/overdue", get(list_overdue))
        .route("/summary", get(summary))
        .route("/total-owed-to-me", get(total_owed_to_me))
        .route("/total-i-owe", get(total_i_owe))
        .route("/:id", get(get_debt).put(update_debt).delete(delete_debt))
        .route("/:id/mark-paid", patch(mark_paid))
        .route("/:id/cancel", patch(cancel))
}

async fn list(state: &AppState, caller: &CurrentUser, view: DebtView) -> ApiResult<Json<Vec<Debt>>> {
    let conn = state.db.lock().await;
    Ok(Json(debts::list(&conn, &caller.0, view, unix_now())?))
}

async fn list_all(State(state): State<AppState>, caller: CurrentUser) -> ApiResult<Json<Vec<Debt>>> {
    list(&state, &caller, DebtView::All).await
}

async fn list_as_creditor(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> ApiResult<Json<Vec<Debt>>> {
    list(&state, &caller, DebtView::AsCreditor).await
}

async fn list_as_debtor(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> ApiResult<Json<Vec<Debt>>> {
    list(&state, &caller, DebtView::AsDebtor).await
}

async fn list_pending(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> ApiResult<Json<Vec<Debt>>> {
    list(&state, &caller, DebtView::Pending).await
}

async fn list_overdue(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> ApiResult<Json<Vec<Debt>>> {
    list(&state, &caller, DebtView::Overdue).await
}

async fn summary(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<DebtSummary>>> {
    let conn = state.db.lock().await;
    Ok(Json(debts::summaries(&conn, &caller, DebtView::All, unix_now())?))
}

async fn total_owed_to_me(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<TotalResponse>> {
    let conn = state.db.lock().await;
    let total = debts::total_owed_to(&conn, caller.user_id)?;
    Ok(Json(TotalResponse { total }))
}

async fn total_i_owe(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<TotalResponse>> {
    let conn = state.db.lock().await;
    let total = debts::total_owed_by(&conn, caller.user_id)?;
    Ok(Json(TotalResponse { total }))
}

async fn get_debt(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(debt_id): Path<DebtId>,
) -> ApiResult<Json<DebtDetails>> {
    let conn = state.db.lock().await;
    Ok(Json(debts::get(&conn, &caller, debt_id, unix_now())?))
}

/// The caller becomes the creditor.
async fn create_debt(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidJson(req): ValidJson<CreateDebtRequest>,
) -> ApiResult<(StatusCode, Json<Debt>)> {
    let debt = {
        let conn = state.db.lock().await;
        debts::create(&conn, &caller, req.into(), unix_now())?
    };
    invalidate_debt(&state, &debt).await;
    Ok((StatusCode::CREATED, Json(debt)))
}

async fn update_debt(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(debt_id): Path<DebtId>,
    ValidJson(req): ValidJson<UpdateDebtRequest>,
) -> ApiResult<Json<Debt>> {
    let patch = DebtPatch::from(req);
    let debt = {
        let mut conn = state.db.lock().await;
        debts::update(&mut conn, &caller, debt_id, &patch, unix_now())?
    };
    invalidate_debt(&state, &debt).await;
    Ok(Json(debt))
}

async fn delete_debt(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(debt_id): Path<DebtId>,
) -> ApiResult<StatusCode> {
    let debt = {
        let conn = state.db.lock().await;
        debts::delete(&conn, &caller, debt_id)?
    };
    invalidate_debt(&state, &debt).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_paid(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(debt_id): Path<DebtId>,
) -> ApiResult<Json<Debt>> {
    let debt = {
        let conn = state.db.lock().await;
        debts::mark_paid(&conn, &caller, debt_id, unix_now())?
    };
    invalidate_debt(&state, &debt).await;
    Ok(Json(debt))
}

async fn cancel(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(debt_id): Path<DebtId>,
) -> ApiResult<Json<Debt>> {
    let debt = {
        let conn = state.db.lock().await;
        debts::cancel(&conn, &caller, debt_id, unix_now())?
    };
    invalidate_debt(&state, &debt).await;
    Ok(Json(debt))
}
