//! Admin console routes
//!
//! Every handler here extracts `AdminUser`, so non-admin tokens get 403.

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::admin;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/payment-requests", get(admin::list_payment_requests))
        .route(
            "/admin/payment-requests/:id/approve",
            post(admin::approve_payment_request),
        )
        .route(
            "/admin/payment-requests/:id/reject",
            post(admin::reject_payment_request),
        )
        .route("/admin/users/:id/top-up", post(admin::top_up_user))
        .route("/admin/stats", get(admin::get_stats))
        .route("/admin/products", post(admin::create_product))
        .route(
            "/admin/products/:id",
            put(admin::update_product).delete(admin::delete_product),
        )
}
