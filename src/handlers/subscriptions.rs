//! Subscription, quota and usage handlers

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::{
    ChatsCountRequest, Plan, PlanOffer, QuotaStatus, SessionAccount, SubscribeRequest,
    TokenUsageRequest,
};
use crate::state::AppState;

/// GET /subscriptions/plans
pub async fn list_plans() -> Json<Vec<PlanOffer>> {
    Json(Plan::ALL.into_iter().map(PlanOffer::from).collect())
}

/// POST /subscriptions - Subscribe or renew at the plan's list price
pub async fn subscribe(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<SessionAccount>, ApiError> {
    let plan = Plan::parse(&req.plan)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown plan: {}", req.plan)))?;

    let account = state
        .ledger
        .subscribe(user.user_id, plan, plan.price())
        .await?;

    Ok(Json(account.into()))
}

/// GET /quota
pub async fn quota_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<QuotaStatus>, ApiError> {
    Ok(Json(state.ledger.quota_status(user.user_id).await?))
}

/// POST /quota/consume - Called before each AI request; 429 when the window is used up
pub async fn consume_quota(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<QuotaStatus>, ApiError> {
    let status = state.ledger.spawn_quota_consumption(user.user_id).await?;

    Ok(Json(status))
}

/// POST /usage/tokens
pub async fn record_token_usage(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<TokenUsageRequest>,
) -> Result<StatusCode, ApiError> {
    req.validate()?;
    state.ledger.spawn_token_usage(user.user_id, req.tokens);

    Ok(StatusCode::ACCEPTED)
}

/// PUT /usage/chats
pub async fn record_chats_count(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<ChatsCountRequest>,
) -> Result<StatusCode, ApiError> {
    req.validate()?;
    state.ledger.spawn_chats_count(user.user_id, req.count);

    Ok(StatusCode::ACCEPTED)
}
