//! Paid membership plans with prorated upgrades

use super::{required_str, Caller, Marketplace};
use crate::errors::{CoreError, CoreResult};
use crate::types::{Entity, Order, RecordQuery, Scope, Table, TenantId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Basic,
    Plus,
    Premium,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Basic, Plan::Plus, Plan::Premium];

    pub fn rank(&self) -> u8 {
        match self {
            Plan::Basic => 0,
            Plan::Plus => 1,
            Plan::Premium => 2,
        }
    }

    /// Yearly price in cents
    pub fn price_cents(&self) -> i64 {
        match self {
            Plan::Basic => 0,
            Plan::Plus => 9_900,
            Plan::Premium => 19_900,
        }
    }

    pub fn benefits(&self) -> &'static [&'static str] {
        match self {
            Plan::Basic => &["Standard booking"],
            Plan::Plus => &["Standard booking", "Priority scheduling", "5% off deep cleans"],
            Plan::Premium => &[
                "Standard booking",
                "Priority scheduling",
                "10% off all services",
                "Dedicated support",
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "basic",
            Plan::Plus => "plus",
            Plan::Premium => "premium",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Plan::Basic),
            "plus" => Ok(Plan::Plus),
            "premium" => Ok(Plan::Premium),
            _ => Err(CoreError::Validation(format!("Invalid plan: {}", s))),
        }
    }
}

/// Public description of a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInfo {
    pub plan: Plan,
    pub rank: u8,
    pub price_cents: i64,
    pub benefits: Vec<String>,
}

impl From<Plan> for PlanInfo {
    fn from(plan: Plan) -> Self {
        Self {
            plan,
            rank: plan.rank(),
            price_cents: plan.price_cents(),
            benefits: plan.benefits().iter().map(|b| b.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub plan: Plan,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: MembershipStatus,
}

impl Entity for Membership {
    const TABLE: Table = Table::Memberships;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

impl Membership {
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == MembershipStatus::Active && self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeQuote {
    pub from: Plan,
    pub to: Plan,
    pub days_remaining: i64,
    pub price_difference_cents: i64,
    pub prorated_cents: i64,
}

/// Whole days left until `expires_at`, rounding partial days up
pub fn days_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (expires_at - now).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

/// `round(price difference * days_remaining / 365)`
pub fn prorate(from: Plan, to: Plan, days_remaining: i64) -> CoreResult<UpgradeQuote> {
    if to.rank() < from.rank() {
        return Err(CoreError::validation("Cannot downgrade membership"));
    }
    if to == from {
        return Err(CoreError::validation("Already on this plan"));
    }

    let days_remaining = days_remaining.max(0);
    let difference = to.price_cents() - from.price_cents();
    let prorated = (difference as f64 * days_remaining as f64 / 365.0).round() as i64;
    Ok(UpgradeQuote {
        from,
        to,
        days_remaining,
        price_difference_cents: difference,
        prorated_cents: prorated,
    })
}

/// Quote an upgrade for a membership at `now`
pub fn upgrade_quote(current: &Membership, target: Plan, now: DateTime<Utc>) -> CoreResult<UpgradeQuote> {
    prorate(current.plan, target, days_remaining(current.expires_at, now))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeResult {
    pub membership: Membership,
    pub quote: UpgradeQuote,
}

pub fn list_plans() -> Vec<PlanInfo> {
    Plan::ALL.iter().copied().map(PlanInfo::from).collect()
}

impl Marketplace {
    /// The caller's active membership, if any
    pub async fn current_membership(&self, caller: &Caller) -> CoreResult<Option<Membership>> {
        let query = RecordQuery::new()
            .eq("user_id", caller.user_id)
            .eq("status", MembershipStatus::Active)
            .order_by("started_at", Order::Desc);
        let memberships: Vec<Membership> = self.select_entities(&Scope::Tenant(caller.tenant()?), query).await?;
        let now = Utc::now();
        Ok(memberships.into_iter().find(|m| m.is_current(now)))
    }

    /// Start a one-year membership
    pub async fn subscribe(&self, caller: &Caller, plan: Option<String>) -> CoreResult<Membership> {
        let plan: Plan = required_str(plan, "plan")?.parse()?;
        let tenant = caller.tenant()?;
        if self.current_membership(caller).await?.is_some() {
            return Err(CoreError::Conflict("Membership already active".to_string()));
        }

        let now = Utc::now();
        let membership = Membership {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            user_id: caller.user_id,
            plan,
            started_at: now,
            expires_at: now + Duration::days(365),
            status: MembershipStatus::Active,
        };
        let membership = self.insert_entity(&Scope::Tenant(tenant), &membership).await?;
        info!("User {} subscribed to {}", caller.user_id, plan);
        Ok(membership)
    }

    /// Move to a higher plan, keeping the expiry date
    pub async fn upgrade_membership(&self, caller: &Caller, plan: Option<String>) -> CoreResult<UpgradeResult> {
        let target: Plan = required_str(plan, "plan")?.parse()?;
        let current = self
            .current_membership(caller)
            .await?
            .ok_or_else(|| CoreError::not_found("Membership"))?;

        let quote = upgrade_quote(&current, target, Utc::now())?;
        let membership = self
            .update_entity::<Membership>(
                &Scope::Tenant(caller.tenant()?),
                current.id,
                serde_json::json!({"plan": target}),
            )
            .await?
            .ok_or_else(|| CoreError::not_found("Membership"))?;

        info!(
            "User {} upgraded {} -> {} for {} cents",
            caller.user_id, quote.from, quote.to, quote.prorated_cents
        );
        Ok(UpgradeResult { membership, quote })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prorate_half_year() {
        let quote = prorate(Plan::Plus, Plan::Premium, 182).unwrap();
        assert_eq!(quote.price_difference_cents, 10_000);
        // 10000 * 182 / 365 = 4986.3
        assert_eq!(quote.prorated_cents, 4_986);

        let quote = prorate(Plan::Basic, Plan::Premium, 365).unwrap();
        assert_eq!(quote.prorated_cents, 19_900);
    }

    #[test]
    fn test_prorate_rejects_downgrade_and_same_plan() {
        let err = prorate(Plan::Premium, Plan::Plus, 100).unwrap_err();
        assert_eq!(err.to_string(), "Cannot downgrade membership");

        let err = prorate(Plan::Plus, Plan::Plus, 100).unwrap_err();
        assert_eq!(err.to_string(), "Already on this plan");
    }

    #[test]
    fn test_days_remaining_rounds_up() {
        let now = Utc::now();
        assert_eq!(days_remaining(now + Duration::hours(1), now), 1);
        assert_eq!(days_remaining(now + Duration::days(10), now), 10);
        assert_eq!(days_remaining(now - Duration::days(3), now), 0);
    }

    #[test]
    fn test_expired_membership_prorates_to_zero() {
        let now = Utc::now();
        let membership = Membership {
            id: Uuid::new_v4(),
            tenant_id: TenantId::new_v4(),
            user_id: Uuid::new_v4(),
            plan: Plan::Basic,
            started_at: now - Duration::days(400),
            expires_at: now - Duration::days(35),
            status: MembershipStatus::Active,
        };
        assert!(!membership.is_current(now));
        assert_eq!(upgrade_quote(&membership, Plan::Plus, now).unwrap().prorated_cents, 0);
    }

    #[test]
    fn test_plan_catalog() {
        let plans = list_plans();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[1].price_cents, 9_900);
        assert!("gold".parse::<Plan>().is_err());
    }
}
