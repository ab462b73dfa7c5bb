//! `/api/payments`: the payment ledger.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tally_core::payments;
use tally_types::payment::{Payment, PaymentSummary};
use tally_types::{unix_now, DebtId, PaymentId};

use crate::auth::CurrentUser;
use crate::cached::invalidate_debt;
use crate::dto::{
    CreatePaymentRequest, IsValidResponse, TotalResponse, ValidJson, ValidateAmountRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_for_user).post(create_payment))
        .route("/summary", get(summary))
        .route("/validate-amount", post(validate_amount))
        .route("/debt/:debt_id", get(list_for_debt))
        .route("/debt/:debt_id/total", get(total_for_debt))
        .route("/:id", get(get_payment).delete(delete_payment))
}

async fn list_for_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<Payment>>> {
    let conn = state.db.lock().await;
    Ok(Json(payments::for_user(&conn, caller.user_id)?))
}

async fn summary(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<PaymentSummary>>> {
    let conn = state.db.lock().await;
    Ok(Json(payments::summaries(&conn, caller.user_id)?))
}

async fn get_payment(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(payment_id): Path<PaymentId>,
) -> ApiResult<Json<Payment>> {
    let conn = state.db.lock().await;
    Ok(Json(payments::get(&conn, &caller, payment_id)?))
}

async fn list_for_debt(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(debt_id): Path<DebtId>,
) -> ApiResult<Json<Vec<Payment>>> {
    let conn = state.db.lock().await;
    Ok(Json(payments::for_debt(&conn, &caller, debt_id)?))
}

async fn total_for_debt(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(debt_id): Path<DebtId>,
) -> ApiResult<Json<TotalResponse>> {
    let conn = state.db.lock().await;
    let total = payments::total_paid_for_debt(&conn, &caller, debt_id)?;
    Ok(Json(TotalResponse { total }))
}

async fn create_payment(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidJson(req): ValidJson<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let outcome = {
        let mut conn = state.db.lock().await;
        payments::create(&mut conn, &caller, req.into(), unix_now())?
    };
    invalidate_debt(&state, &outcome.debt).await;
    Ok((StatusCode::CREATED, Json(outcome.payment)))
}

async fn validate_amount(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidJson(req): ValidJson<ValidateAmountRequest>,
) -> ApiResult<Json<IsValidResponse>> {
    let conn = state.db.lock().await;
    let is_valid = payments::validate_amount(&conn, &caller, req.debt_id, req.amount)?;
    Ok(Json(IsValidResponse { is_valid }))
}

/// Removing a payment can reopen a settled debt.
async fn delete_payment(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(payment_id): Path<PaymentId>,
) -> ApiResult<StatusCode> {
    let outcome = {
        let mut conn = state.db.lock().await;
        payments::delete(&mut conn, &caller, payment_id, unix_now())?
    };
    invalidate_debt(&state, &outcome.debt).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::testutil::{register, send, test_app};
    use axum::http::{Method, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};

    struct Fixture {
        app: Router,
        alice: String,
        bob: String,
        carol: String,
        debt_id: String,
    }

    /// Bob owes Alice 100.00.
    async fn fixture() -> Fixture {
        let (app, _) = test_app();
        let (_, alice, _) = register(&app, "Alice").await;
        let (bob_id, bob, _) = register(&app, "Bob").await;
        let (_, carol, _) = register(&app, "Carol").await;
        let (status, debt) = send(
            &app,
            Method::POST,
            "/api/debts",
            Some(&alice),
            Some(json!({ "debtorId": bob_id, "amount": "100.00" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let debt_id = debt["debtId"].as_str().expect("id").to_string();
        Fixture {
            app,
            alice,
            bob,
            carol,
            debt_id,
        }
    }

    async fn pay(f: &Fixture, token: &str, amount: &str) -> (StatusCode, Value) {
        send(
            &f.app,
            Method::POST,
            "/api/payments",
            Some(token),
            Some(json!({ "debtId": f.debt_id, "amount": amount, "paymentMethod": "cash" })),
        )
        .await
    }

    async fn debt_status(f: &Fixture) -> Value {
        let (_, debt) = send(
            &f.app,
            Method::GET,
            &format!("/api/debts/{}", f.debt_id),
            Some(&f.alice),
            None,
        )
        .await;
        debt["status"].clone()
    }

    #[tokio::test]
    async fn test_payment_cap() {
        let f = fixture().await;
        let (status, _) = pay(&f, &f.bob, "60.00").await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = pay(&f, &f.bob, "40.01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_ARGUMENT");

        let (status, _) = pay(&f, &f.bob, "40.00").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(debt_status(&f).await, "paid");

        // Nothing can be paid on a settled debt.
        let (status, _) = pay(&f, &f.alice, "0.01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_three_decimal_amount_is_400() {
        let f = fixture().await;
        let (status, body) = pay(&f, &f.bob, "10.005").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_stranger_cannot_pay() {
        let f = fixture().await;
        let (status, _) = pay(&f, &f.carol, "1.00").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delete_reopens_settled_debt() {
        let f = fixture().await;
        let (_, payment) = pay(&f, &f.bob, "100.00").await;
        assert_eq!(debt_status(&f).await, "paid");

        let uri = format!("/api/payments/{}", payment["paymentId"].as_str().expect("id"));
        let (status, _) = send(&f.app, Method::DELETE, &uri, Some(&f.alice), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(debt_status(&f).await, "pending");

        let (status, _) = send(&f.app, Method::GET, &uri, Some(&f.alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listings_and_total() {
        let f = fixture().await;
        pay(&f, &f.bob, "10.00").await;
        pay(&f, &f.bob, "15.00").await;

        let (_, total) = send(
            &f.app,
            Method::GET,
            &format!("/api/payments/debt/{}/total", f.debt_id),
            Some(&f.alice),
            None,
        )
        .await;
        assert_eq!(total["total"], "25.00");

        let (_, listed) = send(
            &f.app,
            Method::GET,
            &format!("/api/payments/debt/{}", f.debt_id),
            Some(&f.bob),
            None,
        )
        .await;
        assert_eq!(listed.as_array().map(Vec::len), Some(2));

        let (_, mine) = send(&f.app, Method::GET, "/api/payments", Some(&f.alice), None).await;
        assert_eq!(mine.as_array().map(Vec::len), Some(2));
        let (_, none) = send(&f.app, Method::GET, "/api/payments", Some(&f.carol), None).await;
        assert_eq!(none, json!([]));

        let (_, summary) =
            send(&f.app, Method::GET, "/api/payments/summary", Some(&f.bob), None).await;
        assert_eq!(summary[0]["creditorName"], "Alice Test");
        assert_eq!(summary[0]["debtorName"], "Bob Test");
    }

    #[tokio::test]
    async fn test_validate_amount() {
        let f = fixture().await;
        pay(&f, &f.bob, "70.00").await;
        for (amount, expected) in [("30.00", true), ("30.01", false), ("0", false)] {
            let (status, body) = send(
                &f.app,
                Method::POST,
                "/api/payments/validate-amount",
                Some(&f.bob),
                Some(json!({ "debtId": f.debt_id, "amount": amount })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["isValid"], expected, "{amount}");
        }
    }
}
