//! Catalog and purchase routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::marketplace;
use crate::state::AppState;

pub fn marketplace_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(marketplace::list_products))
        .route("/products/:id", get(marketplace::get_product))
        .route("/marketplace/purchase", post(marketplace::purchase))
}
