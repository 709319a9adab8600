//! Loyalty points and referral handlers

use super::{created, ApiResult, Created};
use crate::extract::{ApiQuery, AuthUser, JsonBody, TenantContext};
use crate::models::{ListParams, QuoteRequest, ReferralRequest};
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use tidyhub_core::services::{required, required_str};

pub async fn account(State(state): State<AppState>, _: TenantContext, user: AuthUser) -> ApiResult {
    let account = state.marketplace.loyalty_summary(&user.caller).await?;
    Ok(Json(json!({ "account": account })))
}

pub async fn history(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult {
    let history = state.marketplace.loyalty_history(&user.caller, params.limit).await?;
    Ok(Json(json!({ "history": history })))
}

/// Preview how many points the caller could redeem against a subtotal
pub async fn quote(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    JsonBody(body): JsonBody<QuoteRequest>,
) -> ApiResult {
    let subtotal = required(body.subtotal_cents, "subtotal_cents")?;
    let quote = state
        .marketplace
        .redemption_quote_for(&user.caller, subtotal, body.points_requested)
        .await?;
    Ok(Json(json!({ "quote": quote })))
}

pub async fn referral_code(State(state): State<AppState>, _: TenantContext, user: AuthUser) -> ApiResult {
    let code = state.marketplace.referral_code(&user.caller).await?;
    Ok(Json(json!({ "referral_code": code })))
}

pub async fn apply_referral(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    JsonBody(body): JsonBody<ReferralRequest>,
) -> Created {
    let code = required_str(body.code, "code")?;
    let referral = state.marketplace.apply_referral_code(&user.caller, &code).await?;
    created(json!({ "referral": referral }))
}
