//! Middleware for the HTTP server

use crate::{ApiError, AppState};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::{Duration, Instant};
use tidyhub_core::pipeline::PipelineStage;
use tidyhub_core::prelude::*;
use tracing::{debug, info, warn};

/// Request logging middleware
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start_time = Instant::now();

    debug!("Incoming request: {} {}", method, uri);

    let response = next.run(request).await;

    let duration = start_time.elapsed();
    let status = response.status();

    if status.is_success() {
        info!("{} {} - {} ({:?})", method, uri, status, duration);
    } else {
        warn!("{} {} - {} ({:?})", method, uri, status, duration);
    }

    response
}

/// Request timeout middleware
pub async fn request_timeout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let timeout_duration = Duration::from_secs(state.config.request_timeout);

    match tokio::time::timeout(timeout_duration, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!("Request timed out after {:?}", timeout_duration);
            ApiError::new(StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
        }
    }
}

/// Build the pipeline context for a request
pub fn request_context(request: &Request) -> RequestContext {
    let mut ctx = RequestContext::new(request.method().to_string(), request.uri().path().to_string());
    ctx.headers = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    ctx
}

/// Run the pre-operation stage, the handler, then the post-operation stage.
///
/// A pre-operation error rejects the request with 403 before any handler runs.
pub async fn run_pipeline(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let ctx = request_context(&request);
    let mut ctx = state.pipeline.execute_stage(PipelineStage::PreOperation, ctx).await;

    if let Some(error) = ctx.error.take() {
        return ApiError::forbidden(error).into_response();
    }

    request.extensions_mut().insert(ctx.clone());
    let response = next.run(request).await;

    ctx.status = Some(response.status().as_u16());
    let ctx = state.pipeline.execute_stage(PipelineStage::PostOperation, ctx).await;
    debug!("Request {} finished in {:?}", ctx.request_id, ctx.elapsed());

    response
}
