//! Insurance claim handlers for customers

use super::{created, ApiResult, Created};
use crate::extract::{ApiPath, ApiQuery, AuthUser, JsonBody, TenantContext};
use crate::models::ListParams;
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use tidyhub_core::services::claims::{ClaimInput, PhotoUpload};
use uuid::Uuid;

pub async fn list_claims(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult {
    let claims = state
        .marketplace
        .list_claims(&user.caller, params.status.as_deref(), params.limit)
        .await?;
    Ok(Json(json!({ "claims": claims })))
}

pub async fn file_claim(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    JsonBody(input): JsonBody<ClaimInput>,
) -> Created {
    let claim = state.marketplace.file_claim(&user.caller, input).await?;
    created(json!({ "claim": claim }))
}

pub async fn get_claim(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult {
    let claim = state.marketplace.get_claim(&user.caller, id).await?;
    Ok(Json(json!({ "claim": claim })))
}

/// Photo bytes arrive base64-encoded in the JSON body
pub async fn upload_photo(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    JsonBody(upload): JsonBody<PhotoUpload>,
) -> Created {
    let photo = state.marketplace.upload_claim_photo(&user.caller, id, upload).await?;
    created(json!({ "photo": photo }))
}
