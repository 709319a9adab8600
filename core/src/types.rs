//! Core data types for TidyHub

use crate::errors::CoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a tenant in the multi-tenant system.
///
/// Tenant ids are always UUID v4; anything else is rejected at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    /// Generate a fresh tenant id
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a tenant id, accepting only RFC 4122 version 4 UUIDs
    pub fn parse_v4(raw: &str) -> Result<Self, CoreError> {
        let uuid = Uuid::parse_str(raw.trim())
            .map_err(|_| CoreError::Tenant("Invalid tenant id".to_string()))?;
        if uuid.get_version_num() != 4 || uuid.get_variant() != uuid::Variant::RFC4122 {
            return Err(CoreError::Tenant("Invalid tenant id".to_string()));
        }
        Ok(Self(uuid))
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an authenticated user (issued by the auth provider)
pub type UserId = Uuid;

/// Platform roles, lowest privilege first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Provider,
    CompanyAdmin,
    Admin,
    RootAdmin,
}

impl Role {
    /// Tenant administrators and root administrators
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::RootAdmin)
    }

    /// Platform-wide administrator, bypasses tenant scoping
    pub fn is_root(&self) -> bool {
        matches!(self, Role::RootAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Provider => "provider",
            Role::CompanyAdmin => "company_admin",
            Role::Admin => "admin",
            Role::RootAdmin => "root_admin",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Customer
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "provider" => Ok(Role::Provider),
            "company_admin" => Ok(Role::CompanyAdmin),
            "admin" => Ok(Role::Admin),
            "root_admin" => Ok(Role::RootAdmin),
            _ => Err(CoreError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

/// Tables owned by the hosted database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tenants,
    Users,
    Bookings,
    Reviews,
    ProviderProfiles,
    Companies,
    CompanyMembers,
    CompanyDomains,
    InsuranceClaims,
    ClaimPhotos,
    LoyaltyAccounts,
    LoyaltyLedger,
    Referrals,
    Memberships,
    UserBadges,
    GamificationPoints,
    Conversations,
    Messages,
    PaymentMethods,
    PayoutAccounts,
    AuditLogs,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Tenants => "tenants",
            Table::Users => "users",
            Table::Bookings => "bookings",
            Table::Reviews => "reviews",
            Table::ProviderProfiles => "provider_profiles",
            Table::Companies => "companies",
            Table::CompanyMembers => "company_members",
            Table::CompanyDomains => "company_domains",
            Table::InsuranceClaims => "insurance_claims",
            Table::ClaimPhotos => "claim_photos",
            Table::LoyaltyAccounts => "loyalty_accounts",
            Table::LoyaltyLedger => "loyalty_ledger",
            Table::Referrals => "referrals",
            Table::Memberships => "memberships",
            Table::UserBadges => "user_badges",
            Table::GamificationPoints => "gamification_points",
            Table::Conversations => "conversations",
            Table::Messages => "messages",
            Table::PaymentMethods => "payment_methods",
            Table::PayoutAccounts => "payout_accounts",
            Table::AuditLogs => "audit_logs",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access scope for a store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Row-level security: only rows of this tenant are visible
    Tenant(TenantId),
    /// Service role: every tenant is visible
    Service,
}

impl Scope {
    pub fn tenant(&self) -> Option<&TenantId> {
        match self {
            Scope::Tenant(tenant) => Some(tenant),
            Scope::Service => None,
        }
    }

    /// Whether a row owned by `row_tenant` is visible under this scope
    pub fn allows(&self, row_tenant: Option<&TenantId>) -> bool {
        match self {
            Scope::Service => true,
            Scope::Tenant(tenant) => row_tenant == Some(tenant),
        }
    }
}

/// A single row in the hosted database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key
    pub id: Uuid,
    /// Owning tenant (`None` for platform-level rows)
    pub tenant_id: Option<TenantId>,
    /// Full row as JSON, including `id` and `tenant_id`
    pub data: serde_json::Value,
}

impl Record {
    /// Build a record from a typed entity
    pub fn from_entity<E: Entity>(entity: &E) -> Result<Self, CoreError> {
        Ok(Self {
            id: entity.id(),
            tenant_id: entity.tenant_id(),
            data: serde_json::to_value(entity)?,
        })
    }

    /// Decode this record into a typed entity
    pub fn into_entity<E: Entity>(self) -> Result<E, CoreError> {
        Ok(serde_json::from_value(self.data)?)
    }

    /// Read a field from the row data
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

/// A typed row stored in one table
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: Table;

    fn id(&self) -> Uuid;

    fn tenant_id(&self) -> Option<TenantId>;
}

/// Row filter, evaluated against fields of the row data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Eq(String, serde_json::Value),
    Neq(String, serde_json::Value),
    In(String, Vec<serde_json::Value>),
    Gte(String, serde_json::Value),
    Lte(String, serde_json::Value),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Serialize) -> Self {
        Filter::Eq(field.into(), to_json(value))
    }

    pub fn neq(field: impl Into<String>, value: impl Serialize) -> Self {
        Filter::Neq(field.into(), to_json(value))
    }

    pub fn gte(field: impl Into<String>, value: impl Serialize) -> Self {
        Filter::Gte(field.into(), to_json(value))
    }

    pub fn lte(field: impl Into<String>, value: impl Serialize) -> Self {
        Filter::Lte(field.into(), to_json(value))
    }

    pub fn is_in<T: Serialize>(field: impl Into<String>, values: impl IntoIterator<Item = T>) -> Self {
        Filter::In(field.into(), values.into_iter().map(to_json).collect())
    }

    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(f, _) | Filter::Neq(f, _) | Filter::In(f, _) | Filter::Gte(f, _) | Filter::Lte(f, _) => f,
        }
    }
}

fn to_json(value: impl Serialize) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

/// Structured select against one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Order)>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Serialize) -> Self {
        self.filter(Filter::eq(field, value))
    }

    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by = Some((field.into(), order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Atomic change to a loyalty balance plus its ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsDelta {
    pub user_id: UserId,
    /// Signed change; negative deltas may not take the balance below zero
    pub delta: i64,
    /// Ledger row written alongside the balance change
    pub entry: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tenant_id_accepts_v4_only() {
        let v4 = Uuid::new_v4().to_string();
        assert!(TenantId::parse_v4(&v4).is_ok());
        assert!(TenantId::parse_v4(&format!("  {}  ", v4)).is_ok());

        // Version 1 UUID
        assert!(TenantId::parse_v4("c232ab00-9414-11ec-b3c8-9f6bdeced846").is_err());
        assert!(TenantId::parse_v4("not-a-uuid").is_err());
        assert!(TenantId::parse_v4("").is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("company_admin".parse::<Role>().unwrap(), Role::CompanyAdmin);
        assert_eq!("ROOT_ADMIN".parse::<Role>().unwrap(), Role::RootAdmin);
        assert!("janitor".parse::<Role>().is_err());
        assert!(Role::RootAdmin.is_admin());
        assert!(!Role::CompanyAdmin.is_admin());
    }

    #[test]
    fn test_scope_visibility() {
        let a = TenantId::new_v4();
        let b = TenantId::new_v4();

        assert!(Scope::Tenant(a).allows(Some(&a)));
        assert!(!Scope::Tenant(a).allows(Some(&b)));
        assert!(!Scope::Tenant(a).allows(None));
        assert!(Scope::Service.allows(Some(&b)));
        assert!(Scope::Service.allows(None));
    }

    #[test]
    fn test_record_query_builder() {
        let query = RecordQuery::new()
            .eq("status", "pending")
            .order_by("created_at", Order::Desc)
            .limit(10);

        assert_eq!(query.filters, vec![Filter::Eq("status".to_string(), json!("pending"))]);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.order_by, Some(("created_at".to_string(), Order::Desc)));
    }
}
