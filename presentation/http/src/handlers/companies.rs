//! Company, membership roster and custom domain handlers

use super::{created, ApiResult, Created};
use crate::extract::{ApiPath, AuthUser, JsonBody, TenantContext};
use crate::models::{DomainRequest, MemberRequest};
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use tidyhub_core::services::companies::CompanyInput;
use uuid::Uuid;

pub async fn create_company(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    JsonBody(input): JsonBody<CompanyInput>,
) -> Created {
    let company = state.marketplace.create_company(&user.caller, input).await?;
    created(json!({ "company": company }))
}

pub async fn get_company(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult {
    let company = state.marketplace.get_company(&user.caller, id).await?;
    Ok(Json(json!({ "company": company })))
}

pub async fn list_members(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult {
    let members = state.marketplace.list_members(&user.caller, id).await?;
    Ok(Json(json!({ "members": members })))
}

pub async fn add_member(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    JsonBody(body): JsonBody<MemberRequest>,
) -> Created {
    let member = state.marketplace.add_member(&user.caller, id, body.user_id, body.role).await?;
    created(json!({ "member": member }))
}

pub async fn remove_member(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath((id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult {
    let removed = state.marketplace.remove_member(&user.caller, id, user_id).await?;
    Ok(Json(json!({ "removed": removed })))
}

pub async fn company_stats(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult {
    let stats = state.marketplace.company_stats(&user.caller, id).await?;
    Ok(Json(json!({ "stats": stats })))
}

pub async fn set_domain(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    JsonBody(body): JsonBody<DomainRequest>,
) -> ApiResult {
    let domain = state.marketplace.set_domain(&user.caller, id, body.domain).await?;
    Ok(Json(json!({ "domain": domain })))
}

/// Check the company's CNAME record against the platform target
pub async fn verify_domain(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult {
    let verification = state.marketplace.verify_domain(&user.caller, id).await?;
    Ok(Json(json!({ "verification": verification })))
}
