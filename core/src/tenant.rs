//! Tenant management utilities and types

use crate::errors::CoreError;
use crate::types::{Entity, Table, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the tenant id
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Cookie carrying the tenant id when the header is absent
pub const TENANT_COOKIE: &str = "tenant_id";

/// Tenant metadata and configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantInfo {
    /// Unique tenant identifier
    pub id: TenantId,
    /// Human-readable name
    pub name: String,
    /// URL-safe unique handle
    pub slug: String,
    /// Tenant status
    pub status: TenantStatus,
    /// Commercial plan (free-form, e.g. "starter")
    pub plan: String,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last updated timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Additional metadata (branding, loyalty cap override, ...)
    pub metadata: serde_json::Value,
}

impl Entity for TenantInfo {
    const TABLE: Table = Table::Tenants;

    fn id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.id)
    }
}

/// Status of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// Tenant is active and operational
    Active,
    /// Tenant is suspended; tenant-scoped requests are refused
    Suspended,
    /// Tenant has been deleted
    Deleted,
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantStatus::Active => write!(f, "active"),
            TenantStatus::Suspended => write!(f, "suspended"),
            TenantStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            "deleted" => Ok(TenantStatus::Deleted),
            _ => Err(CoreError::Validation(format!("Invalid tenant status: {}", s))),
        }
    }
}

impl TenantInfo {
    /// Create a new active tenant
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: TenantId::new_v4(),
            name: name.into(),
            slug: slug.into(),
            status: TenantStatus::Active,
            plan: "starter".to_string(),
            created_at: now,
            updated_at: now,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    /// Set the plan
    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = plan.into();
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    /// Loyalty redemption cap for this tenant, in percent of the subtotal
    pub fn redemption_cap_percent(&self) -> u32 {
        self.metadata
            .get("redemption_cap_percent")
            .and_then(|v| v.as_u64())
            .map(|v| v.min(100) as u32)
            .unwrap_or(crate::services::loyalty::DEFAULT_REDEMPTION_CAP_PERCENT)
    }
}

/// Resolve the tenant for a request: header first, then cookie.
pub fn resolve_tenant(header: Option<&str>, cookie: Option<&str>) -> Result<TenantId, CoreError> {
    let raw = header
        .filter(|v| !v.trim().is_empty())
        .or(cookie.filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| CoreError::Tenant("Tenant context required".to_string()))?;

    TenantId::parse_v4(raw)
}

/// Extract a cookie value from a raw `Cookie` header
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
}

/// Validate a tenant slug: lowercase alphanumerics and dashes, 3-48 chars
pub fn validate_slug(slug: &str) -> Result<(), CoreError> {
    let valid_chars = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if slug.len() < 3 || slug.len() > 48 || !valid_chars || slug.starts_with('-') || slug.ends_with('-') {
        return Err(CoreError::Validation(format!("Invalid slug: {}", slug)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_header() {
        let header = TenantId::new_v4();
        let cookie = TenantId::new_v4();

        let resolved = resolve_tenant(Some(&header.to_string()), Some(&cookie.to_string())).unwrap();
        assert_eq!(resolved, header);

        let resolved = resolve_tenant(None, Some(&cookie.to_string())).unwrap();
        assert_eq!(resolved, cookie);

        let resolved = resolve_tenant(Some("   "), Some(&cookie.to_string())).unwrap();
        assert_eq!(resolved, cookie);
    }

    #[test]
    fn test_resolve_rejects_missing_and_malformed() {
        let err = resolve_tenant(None, None).unwrap_err();
        assert_eq!(err.to_string(), "Tenant context required");

        let err = resolve_tenant(Some("tenant-a"), None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid tenant id");
    }

    #[test]
    fn test_cookie_value() {
        let header = "theme=dark; tenant_id=abc; sb-access-token=tok";
        assert_eq!(cookie_value(header, "tenant_id"), Some("abc"));
        assert_eq!(cookie_value(header, "sb-access-token"), Some("tok"));
        assert_eq!(cookie_value(header, "missing"), None);
    }

    #[test]
    fn test_slug_validation() {
        assert!(validate_slug("sparkle-clean").is_ok());
        assert!(validate_slug("ab").is_err());
        assert!(validate_slug("Sparkle").is_err());
        assert!(validate_slug("-edge").is_err());
    }

    #[test]
    fn test_redemption_cap_override() {
        let mut tenant = TenantInfo::new("Sparkle", "sparkle");
        assert_eq!(tenant.redemption_cap_percent(), 20);

        tenant.metadata = serde_json::json!({"redemption_cap_percent": 35});
        assert_eq!(tenant.redemption_cap_percent(), 35);
    }
}
