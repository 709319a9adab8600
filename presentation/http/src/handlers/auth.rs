//! Signup, login, password reset and session lookup

use super::{created, ApiResult, Created};
use crate::extract::{AuthUser, JsonBody, TenantContext};
use crate::models::{LoginRequest, ResetPasswordRequest};
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use tidyhub_core::services::accounts::SignupInput;
use tracing::info;

pub async fn signup(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    JsonBody(input): JsonBody<SignupInput>,
) -> Created {
    let user = state.marketplace.signup(tenant, input).await?;
    info!("Signed up user {} in tenant {}", user.id, tenant);
    created(json!({ "user": user }))
}

pub async fn login(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    JsonBody(body): JsonBody<LoginRequest>,
) -> ApiResult {
    let session = state.marketplace.login(tenant, body.email, body.password).await?;
    Ok(Json(json!({ "session": session })))
}

/// Always answers the same way so the endpoint cannot be used to probe emails
pub async fn reset_password(
    State(state): State<AppState>,
    _: TenantContext,
    JsonBody(body): JsonBody<ResetPasswordRequest>,
) -> ApiResult {
    state.marketplace.request_password_reset(body.email).await?;
    Ok(Json(json!({
        "message": "If an account exists for that email, a reset link has been sent"
    })))
}

pub async fn session(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    let profile = state.marketplace.session(&user.caller).await?;
    Ok(Json(json!({ "user": profile })))
}
