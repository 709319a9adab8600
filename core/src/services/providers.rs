//! Cleaner profiles

use super::gamification::Action;
use super::{page_limit, required, required_str, Caller, Marketplace};
use crate::errors::{CoreError, CoreResult};
use crate::types::{Entity, RecordQuery, Role, Scope, Table, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub company_id: Option<Uuid>,
    pub display_name: String,
    pub bio: Option<String>,
    pub hourly_rate_cents: i64,
    pub services: Vec<String>,
    pub service_areas: Vec<String>,
    pub verified: bool,
    pub rating_avg: f64,
    pub rating_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for ProviderProfile {
    const TABLE: Table = Table::ProviderProfiles;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub hourly_rate_cents: Option<i64>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub service_areas: Vec<String>,
}

/// Search filters for the provider directory
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderFilter {
    pub service: Option<String>,
    pub area: Option<String>,
    pub verified: Option<bool>,
    pub limit: Option<u32>,
}

impl ProviderFilter {
    fn matches(&self, profile: &ProviderProfile) -> bool {
        let service_ok = self
            .service
            .as_deref()
            .map_or(true, |s| profile.services.iter().any(|x| x.eq_ignore_ascii_case(s)));
        let area_ok = self
            .area
            .as_deref()
            .map_or(true, |a| profile.service_areas.iter().any(|x| x.eq_ignore_ascii_case(a)));
        service_ok && area_ok
    }
}

fn normalize_list(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim().to_lowercase();
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

impl Marketplace {
    /// Create or update the caller's provider profile
    pub async fn upsert_provider_profile(&self, caller: &Caller, input: ProfileInput) -> CoreResult<ProviderProfile> {
        if caller.role != Role::Provider {
            return Err(CoreError::forbidden("Provider role required"));
        }
        let tenant = caller.tenant()?;
        let scope = Scope::Tenant(tenant);
        let display_name = required_str(input.display_name, "display_name")?;
        let hourly_rate_cents = required(input.hourly_rate_cents, "hourly_rate_cents")?;
        if hourly_rate_cents <= 0 {
            return Err(CoreError::validation("hourly_rate_cents must be greater than 0"));
        }
        let bio = input.bio.map(|b| b.trim().to_string()).filter(|b| !b.is_empty());
        let services = normalize_list(input.services);
        let service_areas = normalize_list(input.service_areas);

        if let Some(existing) = self.provider_for_user(&scope, caller.user_id).await? {
            let patch = serde_json::json!({
                "display_name": display_name,
                "bio": bio,
                "hourly_rate_cents": hourly_rate_cents,
                "services": services,
                "service_areas": service_areas,
                "updated_at": Utc::now(),
            });
            return self
                .update_entity::<ProviderProfile>(&scope, existing.id, patch)
                .await?
                .ok_or_else(|| CoreError::not_found("Provider"));
        }

        let now = Utc::now();
        let profile = ProviderProfile {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            user_id: caller.user_id,
            company_id: None,
            display_name,
            bio,
            hourly_rate_cents,
            services,
            service_areas,
            verified: false,
            rating_avg: 0.0,
            rating_count: 0,
            created_at: now,
            updated_at: now,
        };
        let profile = self.insert_entity(&scope, &profile).await?;
        info!("Provider profile created for {}", caller.user_id);

        if let Err(e) = self.award_action(tenant, caller.user_id, Action::ProfileCompleted).await {
            warn!("Failed to award profile points to {}: {}", caller.user_id, e);
        }
        Ok(profile)
    }

    /// Directory search, best rated first
    pub async fn list_providers(&self, tenant: TenantId, filter: ProviderFilter) -> CoreResult<Vec<ProviderProfile>> {
        let mut query = RecordQuery::new();
        if let Some(verified) = filter.verified {
            query = query.eq("verified", verified);
        }
        let mut providers: Vec<ProviderProfile> = self.select_entities(&Scope::Tenant(tenant), query).await?;
        providers.retain(|p| filter.matches(p));
        providers.sort_by(|a, b| {
            b.rating_avg
                .total_cmp(&a.rating_avg)
                .then(b.rating_count.cmp(&a.rating_count))
                .then(a.display_name.cmp(&b.display_name))
        });
        providers.truncate(page_limit(filter.limit) as usize);
        Ok(providers)
    }

    pub async fn get_provider(&self, tenant: TenantId, id: Uuid) -> CoreResult<ProviderProfile> {
        self.get_entity::<ProviderProfile>(&Scope::Tenant(tenant), id)
            .await?
            .ok_or_else(|| CoreError::not_found("Provider"))
    }

    /// Mark a provider as vetted (or revoke it)
    pub async fn verify_provider(&self, caller: &Caller, id: Uuid, verified: Option<bool>) -> CoreResult<ProviderProfile> {
        caller.require_admin()?;
        let verified = verified.unwrap_or(true);
        let provider = self
            .update_entity::<ProviderProfile>(
                &caller.scope(),
                id,
                serde_json::json!({"verified": verified, "updated_at": Utc::now()}),
            )
            .await?
            .ok_or_else(|| CoreError::not_found("Provider"))?;
        info!("Provider {} verified={} by {}", id, verified, caller.user_id);
        Ok(provider)
    }

    pub(crate) async fn provider_for_user(&self, scope: &Scope, user_id: UserId) -> CoreResult<Option<ProviderProfile>> {
        self.first_entity(scope, RecordQuery::new().eq("user_id", user_id)).await
    }
}
