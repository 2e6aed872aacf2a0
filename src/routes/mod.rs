//! Route definitions for the Craft Studio API

mod admin;
mod auth;
mod marketplace;
mod payments;
mod subscriptions;

pub use admin::admin_routes;
pub use auth::auth_routes;
pub use marketplace::marketplace_routes;
pub use payments::payment_routes;
pub use subscriptions::subscription_routes;

use axum::{routing::get, Router};

use crate::handlers::health;
use crate::middleware;
use crate::state::AppState;

/// All API routes with tracing and security headers applied
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health_check))
        .merge(auth_routes())
        .merge(marketplace_routes())
        .merge(subscription_routes())
        .merge(payment_routes())
        .merge(admin_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}

async fn root() -> &'static str {
    "Craft Studio API Server"
}
