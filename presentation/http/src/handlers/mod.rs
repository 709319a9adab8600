//! HTTP request handlers, one module per resource

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod claims;
pub mod companies;
pub mod conversations;
pub mod gamification;
pub mod health;
pub mod loyalty;
pub mod membership;
pub mod payments;
pub mod providers;
pub mod root;

use crate::ApiError;
use axum::{http::StatusCode, Json};
use serde_json::Value;

/// JSON object response with status 200
pub type ApiResult = Result<Json<Value>, ApiError>;

/// JSON object response with status 201
pub type Created = Result<(StatusCode, Json<Value>), ApiError>;

pub(crate) fn created(body: Value) -> Created {
    Ok((StatusCode::CREATED, Json(body)))
}
