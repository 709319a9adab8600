//! Platform-wide tenant management for root admins

use super::{created, ApiResult, Created};
use crate::extract::{ApiPath, JsonBody, RootAdminUser};
use crate::models::{CreateTenantRequest, StatusRequest};
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use tidyhub_core::prelude::TenantId;
use tidyhub_core::services::required_str;
use tracing::info;

pub async fn list_tenants(State(state): State<AppState>, RootAdminUser(root): RootAdminUser) -> ApiResult {
    let tenants = state.marketplace.list_tenants(&root.caller).await?;
    Ok(Json(json!({ "tenants": tenants })))
}

pub async fn create_tenant(
    State(state): State<AppState>,
    RootAdminUser(root): RootAdminUser,
    JsonBody(body): JsonBody<CreateTenantRequest>,
) -> Created {
    let tenant = state
        .marketplace
        .create_tenant(&root.caller, body.name, body.slug, body.plan)
        .await?;
    info!("Root admin {} created tenant {}", root.caller.user_id, tenant.id);
    created(json!({ "tenant": tenant }))
}

pub async fn get_tenant(
    State(state): State<AppState>,
    RootAdminUser(root): RootAdminUser,
    ApiPath(id): ApiPath<TenantId>,
) -> ApiResult {
    let tenant = state.marketplace.get_tenant(&root.caller, id).await?;
    Ok(Json(json!({ "tenant": tenant })))
}

/// Activate or suspend a tenant
pub async fn set_tenant_status(
    State(state): State<AppState>,
    RootAdminUser(root): RootAdminUser,
    ApiPath(id): ApiPath<TenantId>,
    JsonBody(body): JsonBody<StatusRequest>,
) -> ApiResult {
    let status = required_str(body.status, "status")?;
    let tenant = state.marketplace.set_tenant_status(&root.caller, id, &status).await?;
    info!("Root admin {} set tenant {} to {}", root.caller.user_id, id, status);
    Ok(Json(json!({ "tenant": tenant })))
}

pub async fn stats(State(state): State<AppState>, RootAdminUser(root): RootAdminUser) -> ApiResult {
    let stats = state.marketplace.root_stats(&root.caller).await?;
    Ok(Json(json!({ "stats": stats })))
}
