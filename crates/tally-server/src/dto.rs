//! Request and response bodies. JSON fields are camelCase.

use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tally_types::debt::{DebtPatch, NewDebt};
use tally_types::payment::NewPayment;
use tally_types::user::{NewUser, ProfilePatch};
use tally_types::{DebtId, Money, UserId};
use validator::Validate;

use crate::error::ApiError;

/// JSON body that has passed [`Validate`]. Malformed JSON and invalid
/// fields are both 400.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

// Auth

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email, length(max = 100))]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

impl From<RegisterRequest> for NewUser {
    fn from(req: RegisterRequest) -> Self {
        NewUser {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Body of refresh-token and logout.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 6))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub new_password: String,
}

/// Body of verify-email and validate-token.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

// Users

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

impl From<UpdateProfileRequest> for ProfilePatch {
    fn from(req: UpdateProfileRequest) -> Self {
        ProfilePatch {
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
        }
    }
}

// Debts

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDebtRequest {
    pub debtor_id: UserId,
    pub amount: Money,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl From<CreateDebtRequest> for NewDebt {
    fn from(req: CreateDebtRequest) -> Self {
        NewDebt {
            debtor_id: req.debtor_id,
            amount: req.amount,
            description: req.description,
            due_date: req.due_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDebtRequest {
    pub amount: Option<Money>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl From<UpdateDebtRequest> for DebtPatch {
    fn from(req: UpdateDebtRequest) -> Self {
        DebtPatch {
            amount: req.amount,
            description: req.description,
            due_date: req.due_date,
        }
    }
}

// Payments

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub debt_id: DebtId,
    pub amount: Money,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl From<CreatePaymentRequest> for NewPayment {
    fn from(req: CreatePaymentRequest) -> Self {
        NewPayment {
            debt_id: req.debt_id,
            amount: req.amount,
            payment_method: req.payment_method,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAmountRequest {
    pub debt_id: DebtId,
    pub amount: Money,
}

// Friendships

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestBody {
    pub addressee_id: UserId,
}

// Responses

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsValidResponse {
    pub is_valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TotalResponse {
    pub total: Money,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreFriendsResponse {
    pub are_friends: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasPendingResponse {
    pub has_pending_request: bool,
}
