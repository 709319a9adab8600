//! Health check handlers

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

impl HealthStatus {
    fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthStatus>, (StatusCode, Json<Value>)> {
    match state.marketplace.health_check().await {
        Ok(()) => Ok(Json(HealthStatus::healthy())),
        Err(e) => {
            error!("Health check failed: {}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": format!("Store unhealthy: {}", e) })),
            ))
        }
    }
}
