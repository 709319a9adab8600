//! Root-admin tenant management

use super::{required_str, Caller, Marketplace};
use crate::errors::{CoreError, CoreResult};
use crate::tenant::{validate_slug, TenantInfo, TenantStatus};
use crate::types::{Order, RecordQuery, Scope, TenantId};
use chrono::Utc;
use tracing::info;

impl Marketplace {
    /// Create a tenant. Slugs are unique across the platform.
    pub async fn create_tenant(
        &self,
        caller: &Caller,
        name: Option<String>,
        slug: Option<String>,
        plan: Option<String>,
    ) -> CoreResult<TenantInfo> {
        caller.require_root()?;
        let name = required_str(name, "name")?;
        let slug = required_str(slug, "slug")?.to_lowercase();
        validate_slug(&slug)?;

        let existing = RecordQuery::new().eq("slug", &slug);
        if self.first_entity::<TenantInfo>(&Scope::Service, existing).await?.is_some() {
            return Err(CoreError::Conflict(format!("Tenant slug already taken: {}", slug)));
        }

        let mut tenant = TenantInfo::new(name, slug);
        if let Some(plan) = plan.filter(|p| !p.trim().is_empty()) {
            tenant = tenant.with_plan(plan.trim());
        }
        let tenant = self.insert_entity(&Scope::Service, &tenant).await?;
        info!("Created tenant {} ({})", tenant.slug, tenant.id);
        Ok(tenant)
    }

    /// All tenants, newest first
    pub async fn list_tenants(&self, caller: &Caller) -> CoreResult<Vec<TenantInfo>> {
        caller.require_root()?;
        let query = RecordQuery::new().order_by("created_at", Order::Desc);
        self.select_entities(&Scope::Service, query).await
    }

    pub async fn get_tenant(&self, caller: &Caller, id: TenantId) -> CoreResult<TenantInfo> {
        caller.require_root()?;
        self.tenant_info(id).await
    }

    pub async fn set_tenant_status(&self, caller: &Caller, id: TenantId, status: &str) -> CoreResult<TenantInfo> {
        caller.require_root()?;
        let status: TenantStatus = status.parse()?;
        let patch = serde_json::json!({"status": status, "updated_at": Utc::now()});
        let tenant = self
            .update_entity::<TenantInfo>(&Scope::Service, id.as_uuid(), patch)
            .await?
            .ok_or_else(|| CoreError::not_found("Tenant"))?;
        info!("Tenant {} is now {}", tenant.id, tenant.status);
        Ok(tenant)
    }

    /// Look up a tenant regardless of caller
    pub async fn tenant_info(&self, id: TenantId) -> CoreResult<TenantInfo> {
        self.get_entity::<TenantInfo>(&Scope::Service, id.as_uuid())
            .await?
            .ok_or_else(|| CoreError::not_found("Tenant"))
    }

    /// Refuse tenant-scoped work for tenants that are missing or not active
    pub async fn ensure_tenant_active(&self, id: TenantId) -> CoreResult<TenantInfo> {
        let tenant = self
            .get_entity::<TenantInfo>(&Scope::Service, id.as_uuid())
            .await?
            .ok_or_else(|| CoreError::Tenant("Unknown tenant".to_string()))?;
        if !tenant.is_active() {
            return Err(CoreError::Tenant(format!("Tenant is {}", tenant.status)));
        }
        Ok(tenant)
    }
}
