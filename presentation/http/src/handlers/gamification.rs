//! Badges, points and leaderboards

use super::ApiResult;
use crate::extract::{ApiQuery, AuthUser, TenantContext};
use crate::models::ListParams;
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;

pub async fn badges(State(state): State<AppState>, _: TenantContext, user: AuthUser) -> ApiResult {
    let badges = state.marketplace.user_badges(&user.caller).await?;
    Ok(Json(json!({ "badges": badges })))
}

pub async fn points(State(state): State<AppState>, _: TenantContext, user: AuthUser) -> ApiResult {
    let points = state.marketplace.points_summary(&user.caller).await?;
    Ok(Json(json!({ "points": points })))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult {
    let leaderboard = state
        .marketplace
        .leaderboard(&user.caller, params.period.as_deref(), params.limit)
        .await?;
    Ok(Json(json!({ "leaderboard": leaderboard })))
}
