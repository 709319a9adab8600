//! Membership plan handlers

use super::{created, ApiResult, Created};
use crate::extract::{AuthUser, JsonBody, TenantContext};
use crate::models::PlanRequest;
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use tidyhub_core::services::membership;

/// Static plan catalogue; needs neither a tenant nor a session
pub async fn list_plans() -> ApiResult {
    Ok(Json(json!({ "plans": membership::list_plans() })))
}

pub async fn current(State(state): State<AppState>, _: TenantContext, user: AuthUser) -> ApiResult {
    let membership = state.marketplace.current_membership(&user.caller).await?;
    Ok(Json(json!({ "membership": membership })))
}

pub async fn subscribe(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    JsonBody(body): JsonBody<PlanRequest>,
) -> Created {
    let membership = state.marketplace.subscribe(&user.caller, body.plan).await?;
    created(json!({ "membership": membership }))
}

/// Upgrade the active membership, charging the prorated difference
pub async fn upgrade(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    JsonBody(body): JsonBody<PlanRequest>,
) -> ApiResult {
    let upgrade = state.marketplace.upgrade_membership(&user.caller, body.plan).await?;
    Ok(Json(json!({ "upgrade": upgrade })))
}
