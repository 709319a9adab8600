//! HTTP JSON API for the TidyHub marketplace
//!
//! Serves the `/api/**` routes over axum. Every request passes through the
//! core [`PipelineRunner`] for logging, tenant checks and the audit trail,
//! and handlers resolve the caller through the extractors in [`extract`].

use async_trait::async_trait;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tidyhub_core::pipeline::PipelineRunner;
use tidyhub_core::prelude::*;
use tidyhub_core::services::claims::MAX_PHOTO_BYTES;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

pub mod extract;
mod handlers;
mod middleware;
pub mod models;

/// Body limit for photo uploads: a base64 photo at the size cap plus the JSON envelope
pub const PHOTO_BODY_LIMIT: usize = (MAX_PHOTO_BYTES + 2) / 3 * 4 + 64 * 1024;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// Request timeout in seconds
    pub request_timeout: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            enable_cors: true,
            request_timeout: 30,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub marketplace: Arc<Marketplace>,
    pub config: HttpServerConfig,
    pub pipeline: Arc<PipelineRunner>,
}

impl AppState {
    /// State with the default pipeline wired to the marketplace store
    pub fn new(marketplace: Arc<Marketplace>, config: HttpServerConfig) -> Self {
        let pipeline = PipelineRunner::with_defaults(marketplace.store.clone());
        Self {
            marketplace,
            config,
            pipeline: Arc::new(pipeline),
        }
    }
}

/// HTTP presentation adapter
pub struct HttpServer {
    config: HttpServerConfig,
    pipeline: Option<Arc<PipelineRunner>>,
    shutdown: watch::Sender<bool>,
}

impl HttpServer {
    /// Create a server that uses the default pipeline
    pub fn new(config: HttpServerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            pipeline: None,
            shutdown,
        }
    }

    /// Create a server with a custom pipeline
    pub fn new_with_pipeline(config: HttpServerConfig, pipeline: PipelineRunner) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            pipeline: Some(Arc::new(pipeline)),
            shutdown,
        }
    }

    /// Build the router this server would serve
    pub fn router(&self, marketplace: Arc<Marketplace>) -> Router {
        let mut state = AppState::new(marketplace, self.config.clone());
        if let Some(pipeline) = &self.pipeline {
            state.pipeline = pipeline.clone();
        }
        build_router(state)
    }
}

/// Build the axum router with every route and middleware layer
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        .route("/api/health", get(handlers::health::health_check))
        // Accounts
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/reset-password", post(handlers::auth::reset_password))
        .route("/api/auth/session", get(handlers::auth::session))
        // Bookings
        .route("/api/bookings", get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route("/api/bookings/:id/status", patch(handlers::bookings::update_status))
        .route("/api/bookings/:id/assign", patch(handlers::bookings::assign_provider))
        .route("/api/bookings/:id/review", post(handlers::bookings::add_review))
        // Providers
        .route("/api/providers", get(handlers::providers::list_providers))
        .route("/api/providers/profile", post(handlers::providers::upsert_profile))
        .route("/api/providers/connect/onboard", post(handlers::payments::onboard))
        .route("/api/providers/connect/status", get(handlers::payments::connect_status))
        .route("/api/providers/:id", get(handlers::providers::get_provider))
        // Companies
        .route("/api/companies", post(handlers::companies::create_company))
        .route("/api/companies/:id", get(handlers::companies::get_company))
        .route(
            "/api/companies/:id/members",
            get(handlers::companies::list_members).post(handlers::companies::add_member),
        )
        .route("/api/companies/:id/members/:user_id", delete(handlers::companies::remove_member))
        .route("/api/companies/:id/stats", get(handlers::companies::company_stats))
        .route("/api/companies/:id/domain", post(handlers::companies::set_domain))
        .route("/api/companies/:id/domain/verify", post(handlers::companies::verify_domain))
        // Claims
        .route("/api/claims", get(handlers::claims::list_claims).post(handlers::claims::file_claim))
        .route("/api/claims/:id", get(handlers::claims::get_claim))
        .route(
            "/api/claims/:id/photos",
            post(handlers::claims::upload_photo).layer(DefaultBodyLimit::max(PHOTO_BODY_LIMIT)),
        )
        // Loyalty and referrals
        .route("/api/loyalty/account", get(handlers::loyalty::account))
        .route("/api/loyalty/history", get(handlers::loyalty::history))
        .route("/api/loyalty/redeem/quote", post(handlers::loyalty::quote))
        .route("/api/referrals/code", get(handlers::loyalty::referral_code))
        .route("/api/referrals/apply", post(handlers::loyalty::apply_referral))
        // Membership
        .route("/api/membership/plans", get(handlers::membership::list_plans))
        .route("/api/membership", get(handlers::membership::current))
        .route("/api/membership/subscribe", post(handlers::membership::subscribe))
        .route("/api/membership/upgrade", post(handlers::membership::upgrade))
        // Gamification
        .route("/api/gamification/badges", get(handlers::gamification::badges))
        .route("/api/gamification/points", get(handlers::gamification::points))
        .route("/api/gamification/leaderboard", get(handlers::gamification::leaderboard))
        // Conversations
        .route(
            "/api/conversations",
            get(handlers::conversations::list_conversations).post(handlers::conversations::start_conversation),
        )
        .route(
            "/api/conversations/:id/messages",
            get(handlers::conversations::list_messages).post(handlers::conversations::send_message),
        )
        // Payment methods
        .route(
            "/api/payment-methods",
            get(handlers::payments::list_methods).post(handlers::payments::add_method),
        )
        .route("/api/payment-methods/:id/default", patch(handlers::payments::set_default))
        .route("/api/payment-methods/:id", delete(handlers::payments::remove_method))
        // Tenant administration
        .route("/api/admin/users", get(handlers::admin::list_users))
        .route("/api/admin/users/:id/role", patch(handlers::admin::set_role))
        .route("/api/admin/providers/:id/verify", patch(handlers::admin::verify_provider))
        .route("/api/admin/claims", get(handlers::admin::list_claims))
        .route("/api/admin/claims/:id", patch(handlers::admin::review_claim))
        .route("/api/admin/companies", get(handlers::admin::list_companies))
        .route("/api/admin/analytics", get(handlers::admin::analytics))
        .route("/api/admin/loyalty/adjust", post(handlers::admin::adjust_points))
        .route("/api/admin/notifications/whatsapp", post(handlers::admin::send_whatsapp))
        // Platform administration
        .route("/api/root/tenants", get(handlers::root::list_tenants).post(handlers::root::create_tenant))
        .route("/api/root/tenants/:id", get(handlers::root::get_tenant))
        .route("/api/root/tenants/:id/status", patch(handlers::root::set_tenant_status))
        .route("/api/root/stats", get(handlers::root::stats));

    let mut router = api
        .layer(from_fn_with_state(state.clone(), middleware::run_pipeline))
        .layer(from_fn_with_state(state.clone(), middleware::request_timeout))
        .with_state(state.clone());

    if state.config.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(from_fn(middleware::request_logging)),
    )
}

#[async_trait]
impl PresentationAdapter for HttpServer {
    async fn start(&self, marketplace: Arc<Marketplace>) -> Result<(), PresentationError> {
        info!("Starting HTTP server on {}", self.config.bind_address);

        let router = self.router(marketplace);
        let listener = tokio::net::TcpListener::bind(&self.config.bind_address)
            .await
            .map_err(|e| {
                PresentationError::StartupFailed(format!("Failed to bind to {}: {}", self.config.bind_address, e))
            })?;

        info!("HTTP server listening on {}", self.config.bind_address);

        let mut shutdown = self.shutdown.subscribe();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                // A closed channel also means shut down
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
            .map_err(|e| PresentationError::StartupFailed(format!("Server error: {}", e)))?;

        info!("HTTP server stopped");
        Ok(())
    }

    async fn stop(&self) -> Result<(), PresentationError> {
        info!("Stopping HTTP server");
        self.shutdown.send_replace(true);
        Ok(())
    }
}

/// Error response: `{"error": message}` with a status
#[derive(Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        handle_core_error(error)
    }
}

/// Convert core errors to HTTP status codes and responses
pub fn handle_core_error(error: CoreError) -> ApiError {
    let (status, message) = match error {
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        e @ CoreError::MissingField(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        CoreError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        CoreError::Forbidden(msg) | CoreError::Tenant(msg) => (StatusCode::FORBIDDEN, msg),
        e @ CoreError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        CoreError::Store(StoreError::ConstraintViolation(msg)) => (StatusCode::CONFLICT, msg),
        CoreError::Store(StoreError::TenantIsolationViolation(_)) => {
            (StatusCode::FORBIDDEN, "Access denied".to_string())
        }
        CoreError::Store(e) => {
            error!("Record store failure: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
        }
        CoreError::Serialization(_) => (StatusCode::BAD_REQUEST, "Invalid request format".to_string()),
        e @ (CoreError::Auth(_)
        | CoreError::Notify(_)
        | CoreError::Payments(_)
        | CoreError::Storage(_)
        | CoreError::Dns(_)) => (StatusCode::BAD_GATEWAY, e.to_string()),
        e @ (CoreError::Configuration(_) | CoreError::Internal(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    };

    if status.is_server_error() {
        error!("API error: {} - {}", status, message);
    } else {
        warn!("API error: {} - {}", status, message);
    }
    ApiError::new(status, message)
}
