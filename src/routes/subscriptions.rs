//! Subscription, quota and usage routes

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::subscriptions;
use crate::state::AppState;

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions/plans", get(subscriptions::list_plans))
        .route("/subscriptions", post(subscriptions::subscribe))
        .route("/quota", get(subscriptions::quota_status))
        .route("/quota/consume", post(subscriptions::consume_quota))
        .route("/usage/tokens", post(subscriptions::record_token_usage))
        .route("/usage/chats", put(subscriptions::record_chats_count))
}
