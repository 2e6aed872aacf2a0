//! Top-up request routes

use axum::{routing::post, Router};

use crate::handlers::payments;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new().route(
        "/payments/requests",
        post(payments::create_payment_request).get(payments::list_my_payment_requests),
    )
}
