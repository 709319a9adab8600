//! Provider directory and profiles

use crate::extract::{ApiPath, ApiQuery, AuthUser, JsonBody, TenantContext};
use super::ApiResult;
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use tidyhub_core::services::providers::{ProfileInput, ProviderFilter};
use uuid::Uuid;

/// Public directory of the tenant's providers
pub async fn list_providers(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    ApiQuery(filter): ApiQuery<ProviderFilter>,
) -> ApiResult {
    let providers = state.marketplace.list_providers(tenant, filter).await?;
    Ok(Json(json!({ "providers": providers })))
}

pub async fn get_provider(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult {
    let provider = state.marketplace.get_provider(tenant, id).await?;
    Ok(Json(json!({ "provider": provider })))
}

/// Create or replace the caller's own provider profile
pub async fn upsert_profile(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    JsonBody(input): JsonBody<ProfileInput>,
) -> ApiResult {
    let provider = state.marketplace.upsert_provider_profile(&user.caller, input).await?;
    Ok(Json(json!({ "provider": provider })))
}
