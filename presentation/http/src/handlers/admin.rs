//! Tenant administration handlers
//!
//! Root admins may call these too; they act on the tenant named by the
//! request.

use super::{created, ApiResult, Created};
use crate::extract::{AdminUser, ApiPath, ApiQuery, JsonBody};
use crate::models::{AdjustPointsRequest, ListParams, RoleRequest, VerifyRequest, WhatsAppRequest};
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use tidyhub_core::services::claims::ClaimReview;
use tidyhub_core::services::required;
use tracing::info;
use uuid::Uuid;

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult {
    let users = state
        .marketplace
        .list_users(&admin.caller, params.role.as_deref(), params.limit, params.offset)
        .await?;
    Ok(Json(json!({ "users": users })))
}

pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    JsonBody(body): JsonBody<RoleRequest>,
) -> ApiResult {
    let user = state.marketplace.set_user_role(&admin.caller, id, body.role).await?;
    info!("Admin {} set role of {} to {}", admin.caller.user_id, user.id, user.role);
    Ok(Json(json!({ "user": user })))
}

pub async fn verify_provider(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    JsonBody(body): JsonBody<VerifyRequest>,
) -> ApiResult {
    let provider = state.marketplace.verify_provider(&admin.caller, id, body.verified).await?;
    Ok(Json(json!({ "provider": provider })))
}

pub async fn list_claims(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult {
    let claims = state
        .marketplace
        .list_claims(&admin.caller, params.status.as_deref(), params.limit)
        .await?;
    Ok(Json(json!({ "claims": claims })))
}

pub async fn review_claim(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    JsonBody(review): JsonBody<ClaimReview>,
) -> ApiResult {
    let claim = state.marketplace.review_claim(&admin.caller, id, review).await?;
    Ok(Json(json!({ "claim": claim })))
}

pub async fn list_companies(State(state): State<AppState>, AdminUser(admin): AdminUser) -> ApiResult {
    let companies = state.marketplace.list_companies(&admin.caller).await?;
    Ok(Json(json!({ "companies": companies })))
}

pub async fn analytics(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult {
    let stats = state
        .marketplace
        .platform_stats(&admin.caller, params.from.as_deref(), params.to.as_deref())
        .await?;
    Ok(Json(json!({ "stats": stats })))
}

/// Manual credit or debit of a user's points
pub async fn adjust_points(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(body): JsonBody<AdjustPointsRequest>,
) -> ApiResult {
    let user_id = required(body.user_id, "user_id")?;
    let delta = required(body.delta, "delta")?;
    let account = state
        .marketplace
        .adjust_points(&admin.caller, user_id, delta, body.note)
        .await?;
    info!("Admin {} adjusted points of {} by {}", admin.caller.user_id, user_id, delta);
    Ok(Json(json!({ "account": account })))
}

pub async fn send_whatsapp(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(body): JsonBody<WhatsAppRequest>,
) -> Created {
    let receipt = state.marketplace.broadcast_whatsapp(&admin.caller, body.to, body.body).await?;
    created(json!({ "receipt": receipt }))
}
