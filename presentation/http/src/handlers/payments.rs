//! Saved payment methods and provider payout onboarding

use super::{created, ApiResult, Created};
use crate::extract::{ApiPath, AuthUser, JsonBody, TenantContext};
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use tidyhub_core::services::payments::PaymentMethodInput;
use uuid::Uuid;

pub async fn list_methods(State(state): State<AppState>, _: TenantContext, user: AuthUser) -> ApiResult {
    let methods = state.marketplace.list_payment_methods(&user.caller).await?;
    Ok(Json(json!({ "payment_methods": methods })))
}

pub async fn add_method(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    JsonBody(input): JsonBody<PaymentMethodInput>,
) -> Created {
    let method = state.marketplace.add_payment_method(&user.caller, input).await?;
    created(json!({ "payment_method": method }))
}

pub async fn set_default(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult {
    let method = state.marketplace.set_default_payment_method(&user.caller, id).await?;
    Ok(Json(json!({ "payment_method": method })))
}

pub async fn remove_method(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult {
    let removed = state.marketplace.remove_payment_method(&user.caller, id).await?;
    Ok(Json(json!({ "removed": removed })))
}

/// Start (or resume) payout onboarding for the calling provider
pub async fn onboard(State(state): State<AppState>, _: TenantContext, user: AuthUser) -> Created {
    let onboarding = state.marketplace.onboard_provider(&user.caller).await?;
    created(json!({ "onboarding": onboarding }))
}

pub async fn connect_status(State(state): State<AppState>, _: TenantContext, user: AuthUser) -> ApiResult {
    let account = state.marketplace.connect_status(&user.caller).await?;
    Ok(Json(json!({ "account": account })))
}
