//! Balance top-up requests submitted by users

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::{CreatePaymentRequest, PaymentRequest};
use crate::state::AppState;

/// POST /payments/requests - Submit proof of payment for review
pub async fn create_payment_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentRequest>), ApiError> {
    req.validate()?;

    let request = state
        .ledger
        .create_payment_request(user.user_id, req.amount, req.screenshot)
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /payments/requests - The caller's own requests, newest first
pub async fn list_my_payment_requests(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<PaymentRequest>>, ApiError> {
    let requests = state.ledger.list_user_payment_requests(user.user_id).await?;

    Ok(Json(requests))
}
