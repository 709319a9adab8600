//! Booking handlers

use super::{created, ApiResult, Created};
use crate::extract::{ApiPath, ApiQuery, AuthUser, JsonBody, TenantContext};
use crate::models::{AssignRequest, ListParams, ReviewRequest, StatusRequest};
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use tidyhub_core::services::bookings::{BookingInput, BookingListQuery};
use uuid::Uuid;

pub async fn list_bookings(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult {
    let query = BookingListQuery {
        status: params.status,
        limit: params.limit,
        offset: params.offset,
    };
    let bookings = state.marketplace.list_bookings(&user.caller, query).await?;
    Ok(Json(json!({ "bookings": bookings })))
}

pub async fn create_booking(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    JsonBody(input): JsonBody<BookingInput>,
) -> Created {
    let booking = state.marketplace.create_booking(&user.caller, input).await?;
    created(json!({ "booking": booking }))
}

pub async fn get_booking(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult {
    let booking = state.marketplace.get_booking(&user.caller, id).await?;
    Ok(Json(json!({ "booking": booking })))
}

pub async fn update_status(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    JsonBody(body): JsonBody<StatusRequest>,
) -> ApiResult {
    let booking = state.marketplace.update_booking_status(&user.caller, id, body.status).await?;
    Ok(Json(json!({ "booking": booking })))
}

pub async fn assign_provider(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    JsonBody(body): JsonBody<AssignRequest>,
) -> ApiResult {
    let booking = state.marketplace.assign_provider(&user.caller, id, body.provider_id).await?;
    Ok(Json(json!({ "booking": booking })))
}

pub async fn add_review(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    JsonBody(body): JsonBody<ReviewRequest>,
) -> Created {
    let review = state.marketplace.add_review(&user.caller, id, body.rating, body.comment).await?;
    created(json!({ "review": review }))
}
