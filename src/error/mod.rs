//! Centralized API error handling for Craft Studio
//!
//! Ledger, auth and store errors are mapped to HTTP status codes here and
//! rendered as `{"error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::ledger::LedgerError;
use crate::store::StoreError;

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::PaymentRequired(_) => "PAYMENT_REQUIRED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, code = %error_code, "Server error occurred");
        } else {
            tracing::debug!(error = %message, code = %error_code, "Client error occurred");
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::NotFound(_) => ApiError::NotFound(message),
            LedgerError::Conflict(_)
            | LedgerError::AlreadyOwned
            | LedgerError::AlreadyProcessed => ApiError::Conflict(message),
            LedgerError::InsufficientFunds { .. } => ApiError::PaymentRequired(message),
            LedgerError::AccessDenied { .. } => ApiError::Forbidden(message),
            LedgerError::QuotaExceeded { .. } => ApiError::TooManyRequests(message),
            LedgerError::InvalidCredential => ApiError::Unauthorized(message),
            LedgerError::InvalidAmount(_) | LedgerError::AmountOverflow(_) => {
                ApiError::BadRequest(message)
            }
            LedgerError::Transient(_) => ApiError::ServiceUnavailable(message),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::EmailTaken => ApiError::Conflict(message),
            AuthError::InvalidCredentials => ApiError::Unauthorized(message),
            AuthError::UserNotFound => ApiError::NotFound(message),
            AuthError::StoreError(_) => ApiError::ServiceUnavailable(message),
            AuthError::TokenError(_) | AuthError::HashingFailed(_) => {
                ApiError::InternalError(message)
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("Resource not found".to_string()),
            StoreError::VersionConflict | StoreError::Conflict(_) => {
                ApiError::Conflict(err.to_string())
            }
            StoreError::Database(_) => ApiError::ServiceUnavailable(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessLevel, Plan};

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            ApiError::PaymentRequired("test".to_string()).error_code(),
            "PAYMENT_REQUIRED"
        );
        assert_eq!(
            ApiError::Unauthorized("test".to_string()).error_code(),
            "UNAUTHORIZED"
        );
    }

    #[test]
    fn test_ledger_error_status_codes() {
        let cases = [
            (LedgerError::NotFound("Account"), StatusCode::NOT_FOUND),
            (LedgerError::AlreadyOwned, StatusCode::CONFLICT),
            (LedgerError::AlreadyProcessed, StatusCode::CONFLICT),
            (
                LedgerError::Conflict("raced".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                LedgerError::InsufficientFunds {
                    required: 10,
                    available: 5,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                LedgerError::AccessDenied {
                    plan: Plan::Free,
                    required: AccessLevel::Premium,
                },
                StatusCode::FORBIDDEN,
            ),
            (
                LedgerError::QuotaExceeded {
                    limit: 5,
                    plan: Plan::Free,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (LedgerError::InvalidCredential, StatusCode::UNAUTHORIZED),
            (LedgerError::InvalidAmount(-1), StatusCode::BAD_REQUEST),
            (LedgerError::AmountOverflow("balance"), StatusCode::BAD_REQUEST),
            (
                LedgerError::Transient("down".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            ApiError::from(AuthError::EmailTaken).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_message_is_human_readable() {
        let err = ApiError::from(LedgerError::InsufficientFunds {
            required: 300,
            available: 100,
        });
        assert_eq!(
            err.to_string(),
            "Payment required: Insufficient funds: 300 required, 100 available"
        );
    }
}
