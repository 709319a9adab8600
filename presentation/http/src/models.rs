//! Request bodies and query parameters for the HTTP API
//!
//! Every field is optional so that a missing value reaches the services and
//! comes back as `Missing required field: <name>`.

use serde::Deserialize;
use uuid::Uuid;

/// Shared query parameters for list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub role: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Leaderboard window: `week`, `month` or `all`
    pub period: Option<String>,
    /// RFC 3339 lower bound for analytics
    pub from: Option<String>,
    /// RFC 3339 upper bound for analytics
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignRequest {
    pub provider_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MemberRequest {
    pub user_id: Option<Uuid>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DomainRequest {
    pub domain: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteRequest {
    pub subtotal_cents: Option<i64>,
    pub points_requested: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReferralRequest {
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlanRequest {
    pub plan: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConversationRequest {
    pub participant_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageRequest {
    pub body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleRequest {
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    pub verified: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdjustPointsRequest {
    pub user_id: Option<Uuid>,
    pub delta: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppRequest {
    pub to: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTenantRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub plan: Option<String>,
}
