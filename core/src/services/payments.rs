//! Saved payment methods and provider payout accounts

use super::{required, required_str, Caller, Marketplace};
use crate::errors::{CoreError, CoreResult};
use crate::types::{Entity, Filter, Order, RecordQuery, Role, Scope, Table, TenantId, UserId};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub is_default: bool,
    /// When this method last became the default
    pub default_set_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Entity for PaymentMethod {
    const TABLE: Table = Table::PaymentMethods;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMethodInput {
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub exp_month: Option<u32>,
    pub exp_year: Option<i32>,
}

/// Card details must be plausible and unexpired at `now`
pub fn validate_card(last4: &str, exp_month: u32, exp_year: i32, now: DateTime<Utc>) -> CoreResult<()> {
    if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::validation("last4 must be exactly 4 digits"));
    }
    if !(1..=12).contains(&exp_month) {
        return Err(CoreError::validation("exp_month must be between 1 and 12"));
    }
    if (exp_year, exp_month) < (now.year(), now.month()) {
        return Err(CoreError::validation("Card has expired"));
    }
    Ok(())
}

/// Keep a single default: the one most recently made default wins
pub fn resolve_default(mut methods: Vec<PaymentMethod>) -> Vec<PaymentMethod> {
    let winner = methods
        .iter()
        .filter(|m| m.is_default)
        .max_by_key(|m| (m.default_set_at, m.created_at))
        .map(|m| m.id);
    for method in &mut methods {
        method.is_default = Some(method.id) == winner;
    }
    methods
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutAccount {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub account_id: String,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for PayoutAccount {
    const TABLE: Table = Table::PayoutAccounts;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Onboarding {
    pub account_id: String,
    pub url: String,
}

impl Marketplace {
    pub async fn list_payment_methods(&self, caller: &Caller) -> CoreResult<Vec<PaymentMethod>> {
        let query = RecordQuery::new()
            .eq("user_id", caller.user_id)
            .order_by("created_at", Order::Desc);
        let methods = self.select_entities(&Scope::Tenant(caller.tenant()?), query).await?;
        Ok(resolve_default(methods))
    }

    pub async fn add_payment_method(&self, caller: &Caller, input: PaymentMethodInput) -> CoreResult<PaymentMethod> {
        let tenant = caller.tenant()?;
        let brand = required_str(input.brand, "brand")?.to_lowercase();
        let last4 = required_str(input.last4, "last4")?;
        let exp_month = required(input.exp_month, "exp_month")?;
        let exp_year = required(input.exp_year, "exp_year")?;
        let now = Utc::now();
        validate_card(&last4, exp_month, exp_year, now)?;

        let scope = Scope::Tenant(tenant);
        let has_any = self
            .store
            .count(&scope, Table::PaymentMethods, vec![Filter::eq("user_id", caller.user_id)])
            .await?
            > 0;

        let method = PaymentMethod {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            user_id: caller.user_id,
            brand,
            last4,
            exp_month,
            exp_year,
            is_default: !has_any,
            default_set_at: if has_any { None } else { Some(now) },
            created_at: now,
        };
        self.insert_entity(&scope, &method).await
    }

    async fn own_payment_method(&self, caller: &Caller, id: Uuid) -> CoreResult<PaymentMethod> {
        self.get_entity::<PaymentMethod>(&Scope::Tenant(caller.tenant()?), id)
            .await?
            .filter(|m| m.user_id == caller.user_id)
            .ok_or_else(|| CoreError::not_found("Payment method"))
    }

    /// Clear every other default, then mark this one
    pub async fn set_default_payment_method(&self, caller: &Caller, id: Uuid) -> CoreResult<PaymentMethod> {
        let method = self.own_payment_method(caller, id).await?;
        let scope = Scope::Tenant(method.tenant_id);

        let defaults: Vec<PaymentMethod> = self
            .select_entities(
                &scope,
                RecordQuery::new().eq("user_id", caller.user_id).eq("is_default", true),
            )
            .await?;
        for other in defaults.iter().filter(|m| m.id != id) {
            self.update_entity::<PaymentMethod>(&scope, other.id, serde_json::json!({"is_default": false}))
                .await?;
        }

        self.update_entity::<PaymentMethod>(
            &scope,
            id,
            serde_json::json!({"is_default": true, "default_set_at": Utc::now()}),
        )
        .await?
        .ok_or_else(|| CoreError::not_found("Payment method"))
    }

    pub async fn remove_payment_method(&self, caller: &Caller, id: Uuid) -> CoreResult<bool> {
        let method = self.own_payment_method(caller, id).await?;
        let scope = Scope::Tenant(method.tenant_id);
        self.store.delete(&scope, Table::PaymentMethods, id).await?;

        if method.is_default {
            // Promote the newest remaining card
            if let Some(next) = self.list_payment_methods(caller).await?.into_iter().next() {
                self.set_default_payment_method(caller, next.id).await?;
            }
        }
        Ok(true)
    }

    async fn payout_account(&self, scope: &Scope, user_id: UserId) -> CoreResult<Option<PayoutAccount>> {
        self.get_entity::<PayoutAccount>(scope, Uuid::new_v5(&user_id, b"payout")).await
    }

    /// Create the provider's connected account if needed and return an onboarding link
    pub async fn onboard_provider(&self, caller: &Caller) -> CoreResult<Onboarding> {
        if caller.role != Role::Provider {
            return Err(CoreError::forbidden("Provider role required"));
        }
        let tenant = caller.tenant()?;
        let scope = Scope::Tenant(tenant);

        let account = match self.payout_account(&scope, caller.user_id).await? {
            Some(account) => account,
            None => {
                let user = self.get_user(&scope, caller.user_id).await?;
                let connected = self.payments.create_account(&user.email).await?;
                let now = Utc::now();
                let account = PayoutAccount {
                    id: Uuid::new_v5(&caller.user_id, b"payout"),
                    tenant_id: tenant,
                    user_id: caller.user_id,
                    account_id: connected.id,
                    charges_enabled: connected.charges_enabled,
                    payouts_enabled: connected.payouts_enabled,
                    details_submitted: connected.details_submitted,
                    created_at: now,
                    updated_at: now,
                };
                let account = self.insert_entity(&scope, &account).await?;
                info!("Connected account {} created for provider {}", account.account_id, caller.user_id);
                account
            }
        };

        let url = self.payments.onboarding_link(&account.account_id).await?;
        Ok(Onboarding {
            account_id: account.account_id,
            url,
        })
    }

    /// Refresh and return the provider's payout account status
    pub async fn connect_status(&self, caller: &Caller) -> CoreResult<PayoutAccount> {
        if caller.role != Role::Provider {
            return Err(CoreError::forbidden("Provider role required"));
        }
        let scope = Scope::Tenant(caller.tenant()?);
        let account = self
            .payout_account(&scope, caller.user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Payout account"))?;

        let status = self.payments.account_status(&account.account_id).await?;
        if status.id != account.account_id {
            warn!("Payments platform returned account {} for {}", status.id, account.account_id);
        }
        self.update_entity::<PayoutAccount>(
            &scope,
            account.id,
            serde_json::json!({
                "charges_enabled": status.charges_enabled,
                "payouts_enabled": status.payouts_enabled,
                "details_submitted": status.details_submitted,
                "updated_at": Utc::now(),
            }),
        )
        .await?
        .ok_or_else(|| CoreError::not_found("Payout account"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn method(is_default: bool, default_set_at: Option<DateTime<Utc>>) -> PaymentMethod {
        PaymentMethod {
            id: Uuid::new_v4(),
            tenant_id: TenantId::new_v4(),
            user_id: Uuid::new_v4(),
            brand: "visa".into(),
            last4: "4242".into(),
            exp_month: 12,
            exp_year: 2099,
            is_default,
            default_set_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_card() {
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 0, 0, 0).unwrap();
        assert!(validate_card("4242", 6, 2026, now).is_ok());
        assert!(validate_card("4242", 5, 2026, now).is_err());
        assert!(validate_card("424", 6, 2027, now).is_err());
        assert!(validate_card("42a2", 6, 2027, now).is_err());
        assert!(validate_card("4242", 13, 2027, now).is_err());
    }

    #[test]
    fn test_resolve_default_keeps_newest() {
        let now = Utc::now();
        let older = method(true, Some(now - Duration::minutes(5)));
        let newer = method(true, Some(now));
        let plain = method(false, None);
        let newer_id = newer.id;

        let resolved = resolve_default(vec![older, newer, plain]);
        let defaults: Vec<Uuid> = resolved.iter().filter(|m| m.is_default).map(|m| m.id).collect();
        assert_eq!(defaults, vec![newer_id]);
    }
}
