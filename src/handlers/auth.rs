//! Authentication HTTP handlers
//!
//! Endpoints for email and password authentication.

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::{
    AuthTokensResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, SessionAccount,
};
use crate::state::AppState;

/// POST /auth/register - Create an account and issue a token
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthTokensResponse>), ApiError> {
    req.validate()?;

    let tokens = state.auth_service.register(req).await?;

    Ok((StatusCode::CREATED, Json(tokens)))
}

/// POST /auth/login - Exchange email and password for a token
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthTokensResponse>, ApiError> {
    req.validate()?;

    let tokens = state.auth_service.login(req).await?;

    Ok(Json(tokens))
}

/// GET /auth/me - Current account from the session cache
pub async fn get_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<SessionAccount>, ApiError> {
    let session = state.auth_service.current_session(user.user_id).await?;

    Ok(Json(session))
}

/// POST /auth/logout - Drop the cached session
pub async fn logout(State(state): State<AppState>, user: AuthenticatedUser) -> StatusCode {
    state.auth_service.logout(user.user_id).await;

    StatusCode::NO_CONTENT
}

/// POST /auth/password - Change password after checking the current one
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    req.validate()?;

    state
        .ledger
        .change_password(user.user_id, &req.current_password, &req.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
