//! Loyalty points: tiers, redemption capping, ledger and referrals

use super::{page_limit, Caller, Marketplace};
use crate::errors::{CoreError, CoreResult, StoreError};
use crate::types::{Entity, Filter, Order, PointsDelta, RecordQuery, Role, Scope, Table, TenantId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default share of a subtotal that points may cover
pub const DEFAULT_REDEMPTION_CAP_PERCENT: u32 = 20;

/// Smallest redemption that is honoured
pub const MINIMUM_REDEMPTION_POINTS: i64 = 100;

/// Value of one point in cents (0.10 currency units)
pub const POINT_VALUE_CENTS: i64 = 10;

/// Points granted to the referrer once the referee completes a booking
pub const REFERRER_REWARD_POINTS: i64 = 500;

/// Points granted to the referee on that same booking
pub const REFEREE_REWARD_POINTS: i64 = 250;

/// Loyalty tier, computed from trailing-12-month earned points
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    const ALL: [Tier; 4] = [Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Platinum];

    /// Trailing points needed to reach this tier
    pub fn threshold(&self) -> i64 {
        match self {
            Tier::Bronze => 0,
            Tier::Silver => 1_000,
            Tier::Gold => 5_000,
            Tier::Platinum => 15_000,
        }
    }

    /// Bonus multiplier applied to earned points
    pub fn multiplier(&self) -> f64 {
        match self {
            Tier::Bronze => 1.0,
            Tier::Silver => 1.25,
            Tier::Gold => 1.5,
            Tier::Platinum => 2.0,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Bronze => write!(f, "Bronze"),
            Tier::Silver => write!(f, "Silver"),
            Tier::Gold => write!(f, "Gold"),
            Tier::Platinum => write!(f, "Platinum"),
        }
    }
}

/// Highest tier whose threshold `points` reaches
pub fn tier_for_points(points: i64) -> Tier {
    Tier::ALL
        .iter()
        .rev()
        .copied()
        .find(|tier| points >= tier.threshold())
        .unwrap_or(Tier::Bronze)
}

/// The next tier above `points` and how many points are missing
pub fn next_tier(points: i64) -> Option<(Tier, i64)> {
    Tier::ALL
        .iter()
        .copied()
        .find(|tier| tier.threshold() > points)
        .map(|tier| (tier, tier.threshold() - points))
}

/// Why a redemption applied fewer points than asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionReason {
    NoBalance,
    BelowMinimum,
}

/// Result of capping a redemption against balance, subtotal and request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionQuote {
    pub points_applied: i64,
    pub discount_cents: i64,
    /// min(balance, cap, rounded request) before the final rounding
    pub usable: i64,
    /// Points the subtotal cap alone would allow
    pub cap_points: i64,
    pub reason: Option<RedemptionReason>,
}

/// Cap a redemption.
///
/// `cap = floor(subtotal * cap% / 100 / 0.1)`, `usable = min(balance, cap,
/// floor(requested / 10) * 10)` and the applied points are `usable` rounded
/// down to a multiple of 10, or zero when `usable` is below the minimum.
pub fn redemption_quote(balance: i64, subtotal_cents: i64, cap_percent: u32, requested: Option<i64>) -> RedemptionQuote {
    let balance = balance.max(0);
    // subtotal/100 currency units * cap/100 / 0.1 per point
    let cap_points = i128::from(subtotal_cents.max(0)) * i128::from(cap_percent) / 1000;
    let cap_points = i64::try_from(cap_points).unwrap_or(i64::MAX);
    let requested = requested.unwrap_or(balance).max(0) / 10 * 10;

    let usable = balance.min(cap_points).min(requested);
    if balance == 0 {
        return RedemptionQuote {
            points_applied: 0,
            discount_cents: 0,
            usable,
            cap_points,
            reason: Some(RedemptionReason::NoBalance),
        };
    }
    if usable < MINIMUM_REDEMPTION_POINTS {
        return RedemptionQuote {
            points_applied: 0,
            discount_cents: 0,
            usable,
            cap_points,
            reason: Some(RedemptionReason::BelowMinimum),
        };
    }

    let points_applied = usable / 10 * 10;
    RedemptionQuote {
        points_applied,
        discount_cents: points_applied.saturating_mul(POINT_VALUE_CENTS),
        usable,
        cap_points,
        reason: None,
    }
}

/// Points earned for a paid amount at a given tier
pub fn points_for_amount(total_cents: i64, tier: Tier) -> i64 {
    let base = total_cents.max(0) / 100;
    (base as f64 * tier.multiplier()).floor() as i64
}

/// Per-user points balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub balance: i64,
    pub lifetime_points: i64,
    pub tier: Tier,
    pub updated_at: DateTime<Utc>,
}

impl Entity for LoyaltyAccount {
    const TABLE: Table = Table::LoyaltyAccounts;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

impl LoyaltyAccount {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            balance: 0,
            lifetime_points: 0,
            tier: Tier::Bronze,
            updated_at: Utc::now(),
        }
    }
}

/// Why points moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    Earn,
    Redeem,
    Refund,
    Referral,
    Adjustment,
}

impl LedgerReason {
    /// Reasons that count towards tier qualification
    fn counts_for_tier(&self) -> bool {
        matches!(self, LedgerReason::Earn | LedgerReason::Referral)
    }
}

/// One movement of points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub delta: i64,
    pub reason: LedgerReason,
    pub booking_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for LedgerEntry {
    const TABLE: Table = Table::LoyaltyLedger;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

impl LedgerEntry {
    pub fn new(tenant_id: TenantId, user_id: UserId, delta: i64, reason: LedgerReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            delta,
            reason,
            booking_id: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_booking(mut self, booking_id: Uuid) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Use a deterministic id so replays are rejected by the store
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }
}

/// Account view returned to customers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltySummary {
    pub user_id: UserId,
    pub balance: i64,
    pub lifetime_points: i64,
    pub tier: Tier,
    pub multiplier: f64,
    pub trailing_points: i64,
    pub next_tier: Option<Tier>,
    pub points_to_next_tier: Option<i64>,
}

/// Referral status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Rewarded,
}

/// A referee signed up with a referrer's code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub referrer_id: UserId,
    pub referee_id: UserId,
    pub code: String,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
    pub rewarded_at: Option<DateTime<Utc>>,
}

impl Entity for Referral {
    const TABLE: Table = Table::Referrals;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

/// Attempts at a referral code before signup gives up
const REFERRAL_CODE_ATTEMPTS: u32 = 8;

/// Referral code candidate for a user: 8 upper-case hex digits taken from the
/// id, or from a hash of the id and the attempt number on retries
pub fn referral_code_for(user_id: UserId, attempt: u32) -> String {
    let source = if attempt == 0 {
        user_id
    } else {
        Uuid::new_v5(&user_id, &attempt.to_be_bytes())
    };
    source.simple().to_string()[..8].to_uppercase()
}

impl Marketplace {
    /// A referral code no other user of the tenant holds
    pub async fn unique_referral_code(&self, tenant: TenantId, user_id: UserId) -> CoreResult<String> {
        let scope = Scope::Tenant(tenant);
        for attempt in 0..REFERRAL_CODE_ATTEMPTS {
            let code = referral_code_for(user_id, attempt);
            match self.find_user_by_referral_code(&scope, &code).await? {
                Some(holder) if holder.id != user_id => debug!("Referral code {} is taken in tenant {}", code, tenant),
                _ => return Ok(code),
            }
        }
        Err(CoreError::Conflict("Could not allocate a referral code".to_string()))
    }

    /// Get the user's loyalty account, creating an empty one if needed
    pub async fn ensure_loyalty_account(&self, tenant: TenantId, user_id: UserId) -> CoreResult<LoyaltyAccount> {
        let scope = Scope::Tenant(tenant);
        let query = RecordQuery::new().eq("user_id", user_id);
        if let Some(account) = self.first_entity::<LoyaltyAccount>(&scope, query).await? {
            return Ok(account);
        }
        debug!("Creating loyalty account for user {} in tenant {}", user_id, tenant);
        self.insert_entity(&scope, &LoyaltyAccount::new(tenant, user_id)).await
    }

    /// Earned points in the last 365 days
    pub async fn trailing_points(&self, tenant: TenantId, user_id: UserId, now: DateTime<Utc>) -> CoreResult<i64> {
        let since = now - Duration::days(365);
        let query = RecordQuery::new()
            .eq("user_id", user_id)
            .filter(Filter::gte("created_at", since));
        let entries: Vec<LedgerEntry> = self.select_entities(&Scope::Tenant(tenant), query).await?;
        Ok(entries
            .iter()
            .filter(|e| e.reason.counts_for_tier() && e.delta > 0)
            .map(|e| e.delta)
            .sum())
    }

    /// Apply a points movement atomically and refresh the stored tier
    pub(crate) async fn post_points(&self, tenant: TenantId, entry: LedgerEntry) -> CoreResult<i64> {
        self.ensure_loyalty_account(tenant, entry.user_id).await?;

        let user_id = entry.user_id;
        let delta = PointsDelta {
            user_id,
            delta: entry.delta,
            entry: serde_json::to_value(&entry)?,
        };
        let balance = self.store.apply_points(&tenant, delta).await.map_err(|e| match e {
            StoreError::InsufficientBalance { balance, required } => CoreError::Validation(format!(
                "Insufficient points: balance {}, required {}",
                balance, required
            )),
            other => CoreError::Store(other),
        })?;

        let trailing = self.trailing_points(tenant, user_id, Utc::now()).await?;
        let account = self.ensure_loyalty_account(tenant, user_id).await?;
        let tier = tier_for_points(trailing);
        if tier != account.tier {
            info!("User {} moved from {} to {} tier", user_id, account.tier, tier);
            self.update_entity::<LoyaltyAccount>(
                &Scope::Tenant(tenant),
                account.id,
                serde_json::json!({"tier": tier, "updated_at": Utc::now()}),
            )
            .await?;
        }

        Ok(balance)
    }

    /// Balance, tier and progress for the caller
    pub async fn loyalty_summary(&self, caller: &Caller) -> CoreResult<LoyaltySummary> {
        let tenant = caller.tenant()?;
        let account = self.ensure_loyalty_account(tenant, caller.user_id).await?;
        let trailing = self.trailing_points(tenant, caller.user_id, Utc::now()).await?;
        let tier = tier_for_points(trailing);
        let next = next_tier(trailing);

        Ok(LoyaltySummary {
            user_id: caller.user_id,
            balance: account.balance,
            lifetime_points: account.lifetime_points,
            tier,
            multiplier: tier.multiplier(),
            trailing_points: trailing,
            next_tier: next.map(|(t, _)| t),
            points_to_next_tier: next.map(|(_, remaining)| remaining),
        })
    }

    /// Ledger entries for the caller, newest first
    pub async fn loyalty_history(&self, caller: &Caller, limit: Option<u32>) -> CoreResult<Vec<LedgerEntry>> {
        let query = RecordQuery::new()
            .eq("user_id", caller.user_id)
            .order_by("created_at", Order::Desc)
            .limit(page_limit(limit));
        self.select_entities(&Scope::Tenant(caller.tenant()?), query).await
    }

    /// Quote a redemption for the caller against a subtotal
    pub async fn redemption_quote_for(
        &self,
        caller: &Caller,
        subtotal_cents: i64,
        requested: Option<i64>,
    ) -> CoreResult<RedemptionQuote> {
        if subtotal_cents <= 0 {
            return Err(CoreError::validation("subtotal_cents must be greater than 0"));
        }
        let tenant = caller.tenant()?;
        let account = self.ensure_loyalty_account(tenant, caller.user_id).await?;
        let cap = self.tenant_info(tenant).await?.redemption_cap_percent();
        Ok(redemption_quote(account.balance, subtotal_cents, cap, requested))
    }

    /// Award points for a completed booking. Returns the points earned.
    pub async fn earn_for_booking(
        &self,
        tenant: TenantId,
        user_id: UserId,
        booking_id: Uuid,
        total_cents: i64,
    ) -> CoreResult<i64> {
        let trailing = self.trailing_points(tenant, user_id, Utc::now()).await?;
        let points = points_for_amount(total_cents, tier_for_points(trailing));
        if points == 0 {
            return Ok(0);
        }

        // One earn entry per booking, even if completion is replayed
        let entry = LedgerEntry::new(tenant, user_id, points, LedgerReason::Earn)
            .with_booking(booking_id)
            .with_id(Uuid::new_v5(&booking_id, b"loyalty-earn"));
        self.post_points(tenant, entry).await?;
        info!("User {} earned {} points for booking {}", user_id, points, booking_id);
        Ok(points)
    }

    /// Manual balance correction by an admin
    pub async fn adjust_points(
        &self,
        caller: &Caller,
        user_id: UserId,
        delta: i64,
        note: Option<String>,
    ) -> CoreResult<LoyaltyAccount> {
        caller.require_admin()?;
        if delta == 0 {
            return Err(CoreError::validation("delta must not be zero"));
        }
        let tenant = caller.tenant()?;
        self.get_user(&Scope::Tenant(tenant), user_id).await?;

        let mut entry = LedgerEntry::new(tenant, user_id, delta, LedgerReason::Adjustment);
        entry.note = note;
        self.post_points(tenant, entry).await?;
        self.ensure_loyalty_account(tenant, user_id).await
    }

    /// Record that the caller was referred by the owner of `code`
    pub async fn apply_referral_code(&self, caller: &Caller, code: &str) -> CoreResult<Referral> {
        let tenant = caller.tenant()?;
        let scope = Scope::Tenant(tenant);
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(CoreError::MissingField("code"));
        }

        let referrer = self
            .find_user_by_referral_code(&scope, &code)
            .await?
            .ok_or_else(|| CoreError::not_found("Referral code"))?;
        if referrer.id == caller.user_id {
            return Err(CoreError::validation("Cannot use your own referral code"));
        }

        let existing = RecordQuery::new().eq("referee_id", caller.user_id);
        if self.first_entity::<Referral>(&scope, existing).await?.is_some() {
            return Err(CoreError::Conflict("Referral already applied".to_string()));
        }

        let referral = Referral {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            referrer_id: referrer.id,
            referee_id: caller.user_id,
            code,
            status: ReferralStatus::Pending,
            created_at: Utc::now(),
            rewarded_at: None,
        };
        self.insert_entity(&scope, &referral).await
    }

    /// Issue referral rewards for a referee, once
    pub async fn reward_referral(&self, tenant: TenantId, referee_id: UserId) -> CoreResult<Option<Referral>> {
        let scope = Scope::Tenant(tenant);
        let query = RecordQuery::new()
            .eq("referee_id", referee_id)
            .eq("status", ReferralStatus::Pending);
        let Some(referral) = self.first_entity::<Referral>(&scope, query).await? else {
            return Ok(None);
        };

        let rewarded = self
            .update_entity::<Referral>(
                &scope,
                referral.id,
                serde_json::json!({"status": ReferralStatus::Rewarded, "rewarded_at": Utc::now()}),
            )
            .await?
            .ok_or_else(|| CoreError::not_found("Referral"))?;

        // Deterministic ids make a replayed reward collide in the ledger
        let referrer_entry = LedgerEntry::new(tenant, referral.referrer_id, REFERRER_REWARD_POINTS, LedgerReason::Referral)
            .with_id(Uuid::new_v5(&referral.id, b"referrer"));
        let referee_entry = LedgerEntry::new(tenant, referral.referee_id, REFEREE_REWARD_POINTS, LedgerReason::Referral)
            .with_id(Uuid::new_v5(&referral.id, b"referee"));

        self.post_points(tenant, referrer_entry).await?;
        self.post_points(tenant, referee_entry).await?;

        if let Err(e) = self
            .award_action(tenant, referral.referrer_id, super::gamification::Action::ReferralCompleted)
            .await
        {
            warn!("Failed to award referral points to {}: {}", referral.referrer_id, e);
        }

        info!("Referral {} rewarded", referral.id);
        Ok(Some(rewarded))
    }

    /// Referral code of the caller
    pub async fn referral_code(&self, caller: &Caller) -> CoreResult<String> {
        let user = self.get_user(&caller.scope(), caller.user_id).await?;
        Ok(user.referral_code)
    }
}

/// Customers and providers hold loyalty accounts; staff do not
pub fn holds_loyalty_account(role: Role) -> bool {
    matches!(role, Role::Customer | Role::Provider)
}
