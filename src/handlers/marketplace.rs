//! Catalog and purchase handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::{AuthenticatedUser, OptionalUser};
use crate::error::ApiError;
use crate::models::{Product, PurchaseRequest, SessionAccount};
use crate::state::AppState;

/// GET /products - Catalog, newest first, without purchased content
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state.products.list().await?;

    Ok(Json(products.iter().map(Product::public_view).collect()))
}

/// GET /products/:id - Purchased content is included for owners and admins
pub async fn get_product(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .products
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {} not found", id)))?;

    let reveal = match user {
        Some(user) if user.is_admin() => true,
        Some(user) => state
            .ledger
            .account(user.user_id)
            .await
            .map(|account| account.owns(&product.id.to_string()))
            .unwrap_or(false),
        None => false,
    };

    Ok(Json(if reveal {
        product
    } else {
        product.public_view()
    }))
}

/// POST /marketplace/purchase - Buy a catalog item with the account balance
pub async fn purchase(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<SessionAccount>, ApiError> {
    let product = state
        .products
        .get(req.product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {} not found", req.product_id)))?;

    let account = state.ledger.purchase(user.user_id, &product).await?;

    Ok(Json(account.into()))
}
