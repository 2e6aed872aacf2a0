//! Admin console handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::AdminUser;
use crate::error::ApiError;
use crate::models::{
    AdminStats, NewProduct, PaymentRequest, PaymentRequestQuery, Product, ProductPatch,
    SessionAccount, TopUpRequest,
};
use crate::state::AppState;

/// GET /admin/payment-requests?status=pending
pub async fn list_payment_requests(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<PaymentRequestQuery>,
) -> Result<Json<Vec<PaymentRequest>>, ApiError> {
    let requests = state.ledger.list_payment_requests(query.status).await?;

    Ok(Json(requests))
}

/// POST /admin/payment-requests/:id/approve - Approve and credit the requester
pub async fn approve_payment_request(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentRequest>, ApiError> {
    let request = state
        .ledger
        .approve_payment_request(id, admin.user_id)
        .await?;

    Ok(Json(request))
}

/// POST /admin/payment-requests/:id/reject
pub async fn reject_payment_request(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentRequest>, ApiError> {
    let request = state.ledger.reject_payment_request(id, admin.user_id).await?;

    Ok(Json(request))
}

/// POST /admin/users/:id/top-up - Credit an account directly
pub async fn top_up_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<TopUpRequest>,
) -> Result<Json<SessionAccount>, ApiError> {
    req.validate()?;

    tracing::info!(admin_id = %admin.user_id, user_id = %user_id, amount = req.amount, "Manual top-up");
    let account = state.ledger.top_up(user_id, req.amount).await?;

    Ok(Json(account.into()))
}

/// GET /admin/stats
pub async fn get_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<AdminStats>, ApiError> {
    Ok(Json(state.ledger.admin_stats().await?))
}

/// POST /admin/products
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    req.validate()?;

    let product = state.products.create(req).await?;
    tracing::info!(admin_id = %admin.user_id, product_id = %product.id, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /admin/products/:id - Partial update
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ProductPatch>,
) -> Result<Json<Product>, ApiError> {
    req.validate()?;

    let product = state.products.update(id, req).await?;
    tracing::info!(admin_id = %admin.user_id, product_id = %id, "Product updated");

    Ok(Json(product))
}

/// DELETE /admin/products/:id
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.products.delete(id).await?;
    tracing::info!(admin_id = %admin.user_id, product_id = %id, "Product deleted");

    Ok(StatusCode::NO_CONTENT)
}
