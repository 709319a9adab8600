//! In-app messaging between customers and providers

use super::{created, ApiResult, Created};
use crate::extract::{ApiPath, ApiQuery, AuthUser, JsonBody, TenantContext};
use crate::models::{ConversationRequest, ListParams, MessageRequest};
use crate::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use uuid::Uuid;

pub async fn list_conversations(State(state): State<AppState>, _: TenantContext, user: AuthUser) -> ApiResult {
    let conversations = state.marketplace.list_conversations(&user.caller).await?;
    Ok(Json(json!({ "conversations": conversations })))
}

pub async fn start_conversation(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    JsonBody(body): JsonBody<ConversationRequest>,
) -> Created {
    let conversation = state
        .marketplace
        .start_conversation(&user.caller, body.participant_id, body.booking_id)
        .await?;
    created(json!({ "conversation": conversation }))
}

pub async fn list_messages(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult {
    let messages = state.marketplace.list_messages(&user.caller, id, params.limit).await?;
    Ok(Json(json!({ "messages": messages })))
}

pub async fn send_message(
    State(state): State<AppState>,
    _: TenantContext,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    JsonBody(body): JsonBody<MessageRequest>,
) -> Created {
    let message = state.marketplace.send_message(&user.caller, id, body.body).await?;
    created(json!({ "message": message }))
}
