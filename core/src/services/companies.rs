//! Cleaning companies: members, stats and custom domains

use super::bookings::{Booking, BookingStatus};
use super::providers::ProviderProfile;
use super::{required, required_str, Caller, Marketplace};
use crate::errors::{CoreError, CoreResult, StoreError};
use crate::tenant::validate_slug;
use crate::types::{Entity, Order, RecordQuery, Role, Scope, Table, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub owner_id: UserId,
    pub name: String,
    pub slug: String,
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Company {
    const TABLE: Table = Table::Companies;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Member,
    Manager,
}

impl std::str::FromStr for MemberRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "member" => Ok(MemberRole::Member),
            "manager" => Ok(MemberRole::Manager),
            _ => Err(CoreError::Validation(format!("Invalid member role: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyMember {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub company_id: Uuid,
    pub user_id: UserId,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

impl Entity for CompanyMember {
    const TABLE: Table = Table::CompanyMembers;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

/// Membership row id: one per (company, user)
fn member_id(company_id: Uuid, user_id: UserId) -> Uuid {
    Uuid::new_v5(&company_id, user_id.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDomain {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub company_id: Uuid,
    pub domain: String,
    pub cname_target: String,
    pub verified: bool,
    pub verification_token: String,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Entity for CompanyDomain {
    const TABLE: Table = Table::CompanyDomains;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainVerification {
    pub domain: String,
    pub cname_target: String,
    pub verified: bool,
    /// CNAME records seen during the lookup
    pub found: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyStats {
    pub company_id: Uuid,
    pub total_bookings: u64,
    pub completed_bookings: u64,
    pub revenue_cents: i64,
    pub provider_count: u64,
    pub average_rating: Option<f64>,
}

/// Check hostname syntax (RFC 1123 labels, alphabetic TLD)
pub fn validate_hostname(domain: &str) -> CoreResult<String> {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    let invalid = || CoreError::validation(format!("Invalid domain: {}", domain));

    if domain.is_empty() || domain.len() > 253 {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }
    for label in &labels {
        let ok = !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-');
        if !ok {
            return Err(invalid());
        }
    }
    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }
    Ok(domain)
}

/// Compare a CNAME record with its expected target
pub fn cname_matches(record: &str, target: &str) -> bool {
    record.trim().trim_end_matches('.').eq_ignore_ascii_case(target.trim().trim_end_matches('.'))
}

impl Marketplace {
    pub async fn create_company(&self, caller: &Caller, input: CompanyInput) -> CoreResult<Company> {
        if !(caller.role == Role::CompanyAdmin || caller.role.is_admin()) {
            return Err(CoreError::forbidden("Company admin access required"));
        }
        let tenant = caller.tenant()?;
        let scope = Scope::Tenant(tenant);
        let name = required_str(input.name, "name")?;
        let slug = required_str(input.slug, "slug")?.to_lowercase();
        validate_slug(&slug)?;

        if self
            .first_entity::<Company>(&scope, RecordQuery::new().eq("slug", &slug))
            .await?
            .is_some()
        {
            return Err(CoreError::Conflict(format!("Company slug already taken: {}", slug)));
        }

        let company = Company {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            owner_id: caller.user_id,
            name,
            slug,
            contact_email: input.contact_email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()),
            created_at: Utc::now(),
        };
        let company = self.insert_entity(&scope, &company).await?;
        info!("Company {} ({}) created by {}", company.slug, company.id, caller.user_id);
        Ok(company)
    }

    pub async fn get_company(&self, caller: &Caller, id: Uuid) -> CoreResult<Company> {
        self.get_company_row(&caller.scope(), id).await
    }

    pub async fn list_companies(&self, caller: &Caller) -> CoreResult<Vec<Company>> {
        caller.require_admin()?;
        self.select_entities(&caller.scope(), RecordQuery::new().order_by("created_at", Order::Desc))
            .await
    }

    pub(crate) async fn get_company_row(&self, scope: &Scope, id: Uuid) -> CoreResult<Company> {
        self.get_entity::<Company>(scope, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Company"))
    }

    /// Companies a user owns or manages
    pub(crate) async fn managed_company_ids(&self, scope: &Scope, user_id: UserId) -> CoreResult<Vec<Uuid>> {
        let owned: Vec<Company> = self
            .select_entities(scope, RecordQuery::new().eq("owner_id", user_id))
            .await?;
        let managed: Vec<CompanyMember> = self
            .select_entities(
                scope,
                RecordQuery::new().eq("user_id", user_id).eq("role", MemberRole::Manager),
            )
            .await?;

        let mut ids: Vec<Uuid> = owned.iter().map(|c| c.id).collect();
        for member in managed {
            if !ids.contains(&member.company_id) {
                ids.push(member.company_id);
            }
        }
        Ok(ids)
    }

    /// Load a company the caller may administer
    async fn managed_company(&self, caller: &Caller, id: Uuid) -> CoreResult<Company> {
        let scope = caller.scope();
        let company = self.get_company_row(&scope, id).await?;
        if company.owner_id == caller.user_id || caller.role.is_admin() {
            return Ok(company);
        }
        let member = self
            .get_entity::<CompanyMember>(&scope, member_id(id, caller.user_id))
            .await?;
        match member {
            Some(m) if m.role == MemberRole::Manager => Ok(company),
            _ => Err(CoreError::forbidden("Company owner or manager access required")),
        }
    }

    /// Add a provider of the tenant to a company
    pub async fn add_member(
        &self,
        caller: &Caller,
        company_id: Uuid,
        user_id: Option<Uuid>,
        role: Option<String>,
    ) -> CoreResult<CompanyMember> {
        let company = self.managed_company(caller, company_id).await?;
        let user_id = required(user_id, "user_id")?;
        let role = match role.as_deref().filter(|r| !r.trim().is_empty()) {
            Some(raw) => raw.parse::<MemberRole>()?,
            None => MemberRole::Member,
        };

        let scope = Scope::Tenant(company.tenant_id);
        let user = self.get_user(&scope, user_id).await?;
        if user.role != Role::Provider {
            return Err(CoreError::validation("Only providers can join a company"));
        }

        let member = CompanyMember {
            id: member_id(company.id, user_id),
            tenant_id: company.tenant_id,
            company_id: company.id,
            user_id,
            role,
            created_at: Utc::now(),
        };
        let member = self.insert_entity(&scope, &member).await.map_err(|e| match e {
            CoreError::Store(StoreError::ConstraintViolation(_)) => {
                CoreError::Conflict("User is already a member of this company".to_string())
            }
            other => other,
        })?;

        if let Some(profile) = self.provider_for_user(&scope, user_id).await? {
            self.update_entity::<ProviderProfile>(&scope, profile.id, serde_json::json!({"company_id": company.id}))
                .await?;
        }
        info!("User {} joined company {} as {:?}", user_id, company.id, role);
        Ok(member)
    }

    pub async fn remove_member(&self, caller: &Caller, company_id: Uuid, user_id: UserId) -> CoreResult<bool> {
        let company = self.managed_company(caller, company_id).await?;
        let scope = Scope::Tenant(company.tenant_id);
        if !self
            .store
            .delete(&scope, Table::CompanyMembers, member_id(company.id, user_id))
            .await?
        {
            return Err(CoreError::not_found("Member"));
        }

        if let Some(profile) = self.provider_for_user(&scope, user_id).await? {
            if profile.company_id == Some(company.id) {
                self.update_entity::<ProviderProfile>(&scope, profile.id, serde_json::json!({"company_id": null}))
                    .await?;
            }
        }
        info!("User {} removed from company {}", user_id, company.id);
        Ok(true)
    }

    pub async fn list_members(&self, caller: &Caller, company_id: Uuid) -> CoreResult<Vec<CompanyMember>> {
        let company = self.managed_company(caller, company_id).await?;
        self.select_entities(
            &Scope::Tenant(company.tenant_id),
            RecordQuery::new()
                .eq("company_id", company.id)
                .order_by("created_at", Order::Asc),
        )
        .await
    }

    pub async fn company_stats(&self, caller: &Caller, company_id: Uuid) -> CoreResult<CompanyStats> {
        let company = self.managed_company(caller, company_id).await?;
        let scope = Scope::Tenant(company.tenant_id);

        let bookings: Vec<Booking> = self
            .select_entities(&scope, RecordQuery::new().eq("company_id", company.id))
            .await?;
        let providers: Vec<ProviderProfile> = self
            .select_entities(&scope, RecordQuery::new().eq("company_id", company.id))
            .await?;

        let completed: Vec<&Booking> = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Completed)
            .collect();
        let rated: u32 = providers.iter().map(|p| p.rating_count).sum();
        let average_rating = if rated == 0 {
            None
        } else {
            let weighted: f64 = providers.iter().map(|p| p.rating_avg * p.rating_count as f64).sum();
            Some((weighted / rated as f64 * 100.0).round() / 100.0)
        };

        Ok(CompanyStats {
            company_id: company.id,
            total_bookings: bookings.len() as u64,
            completed_bookings: completed.len() as u64,
            revenue_cents: completed.iter().map(|b| b.total_cents).sum(),
            provider_count: providers.len() as u64,
            average_rating,
        })
    }

    /// Attach a custom domain; it stays unverified until its CNAME checks out
    pub async fn set_domain(&self, caller: &Caller, company_id: Uuid, domain: Option<String>) -> CoreResult<CompanyDomain> {
        let company = self.managed_company(caller, company_id).await?;
        let domain = validate_hostname(&required_str(domain, "domain")?)?;
        let scope = Scope::Tenant(company.tenant_id);

        let row = CompanyDomain {
            id: Uuid::new_v5(&company.id, b"domain"),
            tenant_id: company.tenant_id,
            company_id: company.id,
            domain,
            cname_target: format!("{}.{}", company.slug, self.settings.cname_target),
            verified: false,
            verification_token: format!("tidyhub-verify-{}", Uuid::new_v4().simple()),
            verified_at: None,
            created_at: Utc::now(),
        };

        // Replacing the domain resets verification
        self.store.delete(&scope, Table::CompanyDomains, row.id).await?;
        let row = self.insert_entity(&scope, &row).await?;
        info!("Company {} domain set to {}", company.id, row.domain);
        Ok(row)
    }

    pub async fn verify_domain(&self, caller: &Caller, company_id: Uuid) -> CoreResult<DomainVerification> {
        let company = self.managed_company(caller, company_id).await?;
        let scope = Scope::Tenant(company.tenant_id);
        let row = self
            .get_entity::<CompanyDomain>(&scope, Uuid::new_v5(&company.id, b"domain"))
            .await?
            .ok_or_else(|| CoreError::not_found("Domain"))?;

        let found = self.dns.resolve_cname(&row.domain).await?;
        let verified = found.iter().any(|record| cname_matches(record, &row.cname_target));
        debug!("CNAME lookup for {} returned {:?}", row.domain, found);

        if verified && !row.verified {
            self.update_entity::<CompanyDomain>(
                &scope,
                row.id,
                serde_json::json!({"verified": true, "verified_at": Utc::now()}),
            )
            .await?;
            info!("Domain {} verified for company {}", row.domain, company.id);
        }

        Ok(DomainVerification {
            domain: row.domain,
            cname_target: row.cname_target,
            verified,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_hostname() {
        assert_eq!(validate_hostname("Book.Sparkle-Clean.com.").unwrap(), "book.sparkle-clean.com");
        assert!(validate_hostname("localhost").is_err());
        assert!(validate_hostname("-bad.example.com").is_err());
        assert!(validate_hostname("under_score.example.com").is_err());
        assert!(validate_hostname("example.c0m").is_err());
        assert!(validate_hostname("a..b.com").is_err());
    }

    #[test]
    fn test_cname_matching() {
        assert!(cname_matches("sparkle.sites.tidyhub.app.", "sparkle.sites.tidyhub.app"));
        assert!(cname_matches("SPARKLE.Sites.TidyHub.app", "sparkle.sites.tidyhub.app"));
        assert!(!cname_matches("other.sites.tidyhub.app", "sparkle.sites.tidyhub.app"));
    }

    #[test]
    fn test_member_ids_are_stable() {
        let company = Uuid::new_v4();
        let user = Uuid::new_v4();
        assert_eq!(member_id(company, user), member_id(company, user));
        assert_ne!(member_id(company, user), member_id(company, Uuid::new_v4()));
    }
}
