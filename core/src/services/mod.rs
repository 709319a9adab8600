//! Marketplace services.
//!
//! Each submodule adds an `impl Marketplace` block for one area of the
//! product. Handlers in the presentation layer call these methods with a
//! [`Caller`] describing who is asking and under which tenant.

use crate::errors::{CoreError, CoreResult};
use crate::traits::{AuthProvider, DnsResolver, Notification, Notifier, ObjectStorage, PaymentsGateway, RecordStore};
use crate::types::{Entity, Record, RecordQuery, Role, Scope, TenantId, UserId};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod accounts;
pub mod analytics;
pub mod bookings;
pub mod claims;
pub mod companies;
pub mod gamification;
pub mod loyalty;
pub mod membership;
pub mod messaging;
pub mod payments;
pub mod providers;
pub mod tenants;

/// Platform-wide settings that are not owned by any tenant
#[derive(Debug, Clone)]
pub struct MarketplaceSettings {
    /// Suffix for custom-domain CNAME targets (`<company-slug>.<suffix>`)
    pub cname_target: String,
    /// Public URL used in onboarding return links
    pub public_url: String,
}

impl Default for MarketplaceSettings {
    fn default() -> Self {
        Self {
            cname_target: "sites.tidyhub.app".to_string(),
            public_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Who is calling, and under which tenant
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
    /// Resolved tenant; `None` only for root admins acting platform-wide
    pub tenant: Option<TenantId>,
}

impl Caller {
    pub fn new(user_id: UserId, role: Role, tenant: TenantId) -> Self {
        Self {
            user_id,
            role,
            tenant: Some(tenant),
        }
    }

    /// Store scope for this caller. Only root admins without a tenant get the
    /// service role.
    pub fn scope(&self) -> Scope {
        match (self.tenant, self.role.is_root()) {
            (Some(tenant), _) => Scope::Tenant(tenant),
            (None, true) => Scope::Service,
            // Unreachable through the HTTP extractors; fail closed anyway
            (None, false) => Scope::Tenant(TenantId(Uuid::nil())),
        }
    }

    pub fn tenant(&self) -> CoreResult<TenantId> {
        self.tenant
            .ok_or_else(|| CoreError::Tenant("Tenant context required".to_string()))
    }

    pub fn require_admin(&self) -> CoreResult<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(CoreError::forbidden("Admin access required"))
        }
    }

    pub fn require_root(&self) -> CoreResult<()> {
        if self.role.is_root() {
            Ok(())
        } else {
            Err(CoreError::forbidden("Root admin access required"))
        }
    }

    pub fn require_role(&self, role: Role) -> CoreResult<()> {
        if self.role == role || self.role.is_admin() {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!("{} role required", role)))
        }
    }
}

/// Service container shared by every request handler
pub struct Marketplace {
    pub store: Arc<dyn RecordStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub notifier: Arc<dyn Notifier>,
    pub payments: Arc<dyn PaymentsGateway>,
    pub dns: Arc<dyn DnsResolver>,
    pub settings: MarketplaceSettings,
}

impl Marketplace {
    pub fn new(
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthProvider>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Arc<dyn Notifier>,
        payments: Arc<dyn PaymentsGateway>,
        dns: Arc<dyn DnsResolver>,
    ) -> Self {
        Self {
            store,
            auth,
            storage,
            notifier,
            payments,
            dns,
            settings: MarketplaceSettings::default(),
        }
    }

    /// Replace the platform settings
    pub fn with_settings(mut self, settings: MarketplaceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Check that the record store is reachable
    pub async fn health_check(&self) -> CoreResult<()> {
        Ok(self.store.health_check().await?)
    }

    pub(crate) async fn insert_entity<E: Entity>(&self, scope: &Scope, entity: &E) -> CoreResult<E> {
        let record = Record::from_entity(entity)?;
        debug!("Inserting {} row {}", E::TABLE, record.id);
        self.store.insert(scope, E::TABLE, record).await?.into_entity()
    }

    pub(crate) async fn get_entity<E: Entity>(&self, scope: &Scope, id: Uuid) -> CoreResult<Option<E>> {
        match self.store.get(scope, E::TABLE, id).await? {
            Some(record) => Ok(Some(record.into_entity()?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn select_entities<E: Entity>(&self, scope: &Scope, query: RecordQuery) -> CoreResult<Vec<E>> {
        self.store
            .select(scope, E::TABLE, query)
            .await?
            .into_iter()
            .map(Record::into_entity)
            .collect()
    }

    pub(crate) async fn first_entity<E: Entity>(&self, scope: &Scope, query: RecordQuery) -> CoreResult<Option<E>> {
        Ok(self.select_entities(scope, query.limit(1)).await?.into_iter().next())
    }

    pub(crate) async fn update_entity<E: Entity>(
        &self,
        scope: &Scope,
        id: Uuid,
        patch: serde_json::Value,
    ) -> CoreResult<Option<E>> {
        match self.store.update(scope, E::TABLE, id, patch).await? {
            Some(record) => Ok(Some(record.into_entity()?)),
            None => Ok(None),
        }
    }

    /// Send a notification, logging instead of failing
    pub(crate) async fn notify_best_effort(&self, notification: Notification) {
        let channel = notification.channel;
        if let Err(e) = self.notifier.send(notification).await {
            warn!("Failed to send {:?} notification: {}", channel, e);
        }
    }
}

/// Require an optional string field to be present and non-blank
pub fn required_str(value: Option<String>, field: &'static str) -> CoreResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(CoreError::MissingField(field)),
    }
}

/// Require an optional field to be present
pub fn required<T>(value: Option<T>, field: &'static str) -> CoreResult<T> {
    value.ok_or(CoreError::MissingField(field))
}

/// Clamp a caller-supplied page size
pub(crate) fn page_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(50).clamp(1, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_scope() {
        let tenant = TenantId::new_v4();
        let user = Uuid::new_v4();

        let caller = Caller::new(user, Role::Customer, tenant);
        assert_eq!(caller.scope(), Scope::Tenant(tenant));

        let root = Caller { user_id: user, role: Role::RootAdmin, tenant: None };
        assert_eq!(root.scope(), Scope::Service);

        let stray = Caller { user_id: user, role: Role::Admin, tenant: None };
        assert_ne!(stray.scope(), Scope::Service);
    }

    #[test]
    fn test_role_guards() {
        let tenant = TenantId::new_v4();
        let customer = Caller::new(Uuid::new_v4(), Role::Customer, tenant);
        let admin = Caller::new(Uuid::new_v4(), Role::Admin, tenant);

        assert!(customer.require_admin().is_err());
        assert!(customer.require_role(Role::Provider).is_err());
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_role(Role::Provider).is_ok());
        assert!(admin.require_root().is_err());
    }

    #[test]
    fn test_required_helpers() {
        assert_eq!(required_str(Some(" x ".to_string()), "name").unwrap(), "x");
        let err = required_str(Some("  ".to_string()), "name").unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: name");
        assert!(required::<u32>(None, "amount").is_err());
        assert_eq!(page_limit(None), 50);
        assert_eq!(page_limit(Some(1000)), 100);
        assert_eq!(page_limit(Some(0)), 1);
    }
}
