//! API error types.
//!
//! Every handler returns [`ApiResult`]. Domain failures map to one status
//! code each; internal failures are logged here and answered with a
//! generic message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tally_core::Error;
use thiserror::Error as ThisError;
use validator::ValidationErrors;

/// API-specific errors.
#[derive(ThisError, Debug)]
pub enum ApiError {
    /// Malformed body or failed field validation.
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Domain(#[from] Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(e) => match e {
                Error::InvalidArgument(_) | Error::InvalidOperation(_) => StatusCode::BAD_REQUEST,
                Error::Unauthorized => StatusCode::UNAUTHORIZED,
                Error::Forbidden(_) => StatusCode::FORBIDDEN,
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::Conflict(_) => StatusCode::CONFLICT,
                Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Domain(e) => match e {
                Error::InvalidArgument(_) => "INVALID_ARGUMENT",
                Error::InvalidOperation(_) => "INVALID_OPERATION",
                Error::Unauthorized => "UNAUTHORIZED",
                Error::Forbidden(_) => "FORBIDDEN",
                Error::NotFound(_) => "NOT_FOUND",
                Error::Conflict(_) => "CONFLICT",
                Error::Internal(_) => "INTERNAL_ERROR",
            },
        }
    }

    /// Message safe to show a client.
    fn public_message(&self) -> String {
        match self {
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Domain(e) => match e {
                Error::InvalidArgument(msg)
                | Error::InvalidOperation(msg)
                | Error::Forbidden(msg)
                | Error::Conflict(msg) => msg.clone(),
                Error::NotFound(what) => format!("{what} not found"),
                Error::Unauthorized => "invalid credentials or token".to_string(),
                Error::Internal(_) => "internal server error".to_string(),
            },
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ApiError::Domain(Error::InvalidArgument(message.into()))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::Domain(Error::NotFound(what.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Domain(Error::Internal(cause)) = &self {
            tracing::error!(error = %cause, "internal error");
        }
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.public_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, _)| field.to_string())
            .collect();
        fields.sort();
        ApiError::Validation(format!("invalid fields: {}", fields.join(", ")))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(error: ApiError) -> (StatusCode, ErrorResponse) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (Error::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (Error::InvalidOperation("x".into()), StatusCode::BAD_REQUEST),
            (Error::Unauthorized, StatusCode::UNAUTHORIZED),
            (Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (Error::NotFound("debt".into()), StatusCode::NOT_FOUND),
            (Error::Conflict("x".into()), StatusCode::CONFLICT),
            (Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            let (status, _) = render(error.into()).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_internal_detail_not_leaked() {
        let (_, body) = render(Error::Internal("disk I/O error at /var/db".into()).into()).await;
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert_eq!(body.message, "internal server error");
    }

    #[tokio::test]
    async fn test_not_found_message() {
        let (_, body) = render(ApiError::not_found("debt")).await;
        assert_eq!(body.code, "NOT_FOUND");
        assert_eq!(body.message, "debt not found");
    }
}
