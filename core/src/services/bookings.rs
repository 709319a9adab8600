//! Bookings, status workflow and reviews

use super::gamification::Action;
use super::loyalty::{LedgerEntry, LedgerReason, RedemptionQuote};
use super::{page_limit, required, required_str, Caller, Marketplace};
use crate::errors::{CoreError, CoreResult, StoreError};
use crate::traits::Notification;
use crate::types::{Entity, Filter, Order, RecordQuery, Role, Scope, Table, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Standard,
    Deep,
    MoveOut,
    Office,
    Window,
    Carpet,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Standard => "standard",
            ServiceType::Deep => "deep",
            ServiceType::MoveOut => "move_out",
            ServiceType::Office => "office",
            ServiceType::Window => "window",
            ServiceType::Carpet => "carpet",
        }
    }
}

impl std::str::FromStr for ServiceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "standard" => Ok(ServiceType::Standard),
            "deep" => Ok(ServiceType::Deep),
            "move_out" => Ok(ServiceType::MoveOut),
            "office" => Ok(ServiceType::Office),
            "window" => Ok(ServiceType::Window),
            "carpet" => Ok(ServiceType::Carpet),
            _ => Err(CoreError::Validation(format!("Invalid service type: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Allowed moves through the booking workflow
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, InProgress) | (Confirmed, Cancelled) | (InProgress, Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "in_progress" => Ok(BookingStatus::InProgress),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(CoreError::Validation(format!("Invalid status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub customer_id: UserId,
    /// User id of the assigned provider
    pub provider_id: Option<UserId>,
    pub company_id: Option<Uuid>,
    pub service_type: ServiceType,
    pub scheduled_at: DateTime<Utc>,
    pub duration_hours: u32,
    pub address: String,
    pub subtotal_cents: i64,
    pub points_redeemed: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Booking {
    const TABLE: Table = Table::Bookings;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingInput {
    pub service_type: Option<String>,
    pub scheduled_at: Option<String>,
    pub duration_hours: Option<u32>,
    pub address: Option<String>,
    pub subtotal_cents: Option<i64>,
    pub notes: Option<String>,
    pub provider_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub redeem_points: bool,
    pub points_requested: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub booking_id: Uuid,
    pub customer_id: UserId,
    pub provider_id: UserId,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Review {
    const TABLE: Table = Table::Reviews;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

/// Parse an RFC 3339 timestamp from a request body
pub(crate) fn parse_timestamp(raw: &str, field: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CoreError::validation(format!("Invalid {}: expected an RFC 3339 timestamp", field)))
}

impl Marketplace {
    pub async fn create_booking(&self, caller: &Caller, input: BookingInput) -> CoreResult<Booking> {
        let tenant = caller.tenant()?;
        let scope = Scope::Tenant(tenant);

        let service_type: ServiceType = required_str(input.service_type, "service_type")?.parse()?;
        let scheduled_at = parse_timestamp(&required_str(input.scheduled_at, "scheduled_at")?, "scheduled_at")?;
        let address = required_str(input.address, "address")?;
        let subtotal_cents = required(input.subtotal_cents, "subtotal_cents")?;

        let now = Utc::now();
        if scheduled_at <= now {
            return Err(CoreError::validation("scheduled_at must be in the future"));
        }
        if subtotal_cents <= 0 {
            return Err(CoreError::validation("subtotal_cents must be greater than 0"));
        }
        let duration_hours = input.duration_hours.unwrap_or(2);
        if !(1..=12).contains(&duration_hours) {
            return Err(CoreError::validation("duration_hours must be between 1 and 12"));
        }

        if let Some(provider_id) = input.provider_id {
            if self.provider_for_user(&scope, provider_id).await?.is_none() {
                return Err(CoreError::not_found("Provider"));
            }
        }
        if let Some(company_id) = input.company_id {
            self.get_company_row(&scope, company_id).await?;
        }

        let id = Uuid::new_v4();
        let quote = if input.redeem_points {
            Some(self.redemption_quote_for(caller, subtotal_cents, input.points_requested).await?)
        } else {
            None
        };
        let (points_redeemed, discount_cents) = match &quote {
            Some(RedemptionQuote { points_applied, discount_cents, .. }) => (*points_applied, *discount_cents),
            None => (0, 0),
        };

        if points_redeemed > 0 {
            let entry = LedgerEntry::new(tenant, caller.user_id, -points_redeemed, LedgerReason::Redeem)
                .with_booking(id)
                .with_id(Uuid::new_v5(&id, b"loyalty-redeem"));
            self.post_points(tenant, entry).await?;
        }

        let booking = Booking {
            id,
            tenant_id: tenant,
            customer_id: caller.user_id,
            provider_id: input.provider_id,
            company_id: input.company_id,
            service_type,
            scheduled_at,
            duration_hours,
            address,
            subtotal_cents,
            points_redeemed,
            discount_cents,
            total_cents: subtotal_cents - discount_cents,
            status: BookingStatus::Pending,
            notes: input.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_at: now,
            updated_at: now,
        };

        match self.insert_entity(&scope, &booking).await {
            Ok(booking) => {
                info!("Booking {} created by {} ({} points redeemed)", booking.id, caller.user_id, points_redeemed);
                Ok(booking)
            }
            Err(e) => {
                if points_redeemed > 0 {
                    self.refund_points(tenant, &booking).await;
                }
                Err(e)
            }
        }
    }

    /// Bookings visible to the caller, newest first
    pub async fn list_bookings(&self, caller: &Caller, params: BookingListQuery) -> CoreResult<Vec<Booking>> {
        let scope = caller.scope();
        let mut query = RecordQuery::new()
            .order_by("created_at", Order::Desc)
            .limit(page_limit(params.limit))
            .offset(params.offset.unwrap_or(0));

        if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
            query = query.eq("status", status.parse::<BookingStatus>()?);
        }

        query = match caller.role {
            Role::Customer => query.eq("customer_id", caller.user_id),
            Role::Provider => query.eq("provider_id", caller.user_id),
            Role::CompanyAdmin => {
                let companies = self.managed_company_ids(&scope, caller.user_id).await?;
                if companies.is_empty() {
                    return Ok(Vec::new());
                }
                query.filter(Filter::is_in("company_id", companies))
            }
            Role::Admin | Role::RootAdmin => query,
        };

        self.select_entities(&scope, query).await
    }

    pub async fn get_booking(&self, caller: &Caller, id: Uuid) -> CoreResult<Booking> {
        let booking = self
            .get_entity::<Booking>(&caller.scope(), id)
            .await?
            .ok_or_else(|| CoreError::not_found("Booking"))?;
        if !self.can_see_booking(caller, &booking).await? {
            return Err(CoreError::not_found("Booking"));
        }
        Ok(booking)
    }

    pub(crate) async fn can_see_booking(&self, caller: &Caller, booking: &Booking) -> CoreResult<bool> {
        Ok(match caller.role {
            Role::Admin | Role::RootAdmin => true,
            Role::Customer => booking.customer_id == caller.user_id,
            Role::Provider => booking.provider_id == Some(caller.user_id) || booking.customer_id == caller.user_id,
            Role::CompanyAdmin => match booking.company_id {
                Some(company_id) => self
                    .managed_company_ids(&caller.scope(), caller.user_id)
                    .await?
                    .contains(&company_id),
                None => booking.customer_id == caller.user_id,
            },
        })
    }

    /// Move a booking along its workflow
    pub async fn update_booking_status(&self, caller: &Caller, id: Uuid, status: Option<String>) -> CoreResult<Booking> {
        let next: BookingStatus = required_str(status, "status")?.parse()?;
        let booking = self.get_booking(caller, id).await?;
        let tenant = booking.tenant_id;

        let acting_as_customer = booking.customer_id == caller.user_id && booking.provider_id != Some(caller.user_id);
        if acting_as_customer && !caller.role.is_admin() && next != BookingStatus::Cancelled {
            return Err(CoreError::forbidden("Customers can only cancel bookings"));
        }
        if !booking.status.can_transition_to(next) {
            return Err(CoreError::validation("Invalid status transition"));
        }

        let updated = self
            .update_entity::<Booking>(
                &Scope::Tenant(tenant),
                id,
                serde_json::json!({"status": next, "updated_at": Utc::now()}),
            )
            .await?
            .ok_or_else(|| CoreError::not_found("Booking"))?;
        info!("Booking {} {} -> {} by {}", id, booking.status, next, caller.user_id);

        match next {
            BookingStatus::Cancelled if updated.points_redeemed > 0 => self.refund_points(tenant, &updated).await,
            BookingStatus::Completed => self.on_booking_completed(&updated).await,
            _ => {}
        }

        self.notify_booking_status(&updated).await;
        Ok(updated)
    }

    /// Return redeemed points for a booking, once
    async fn refund_points(&self, tenant: TenantId, booking: &Booking) {
        let entry = LedgerEntry::new(tenant, booking.customer_id, booking.points_redeemed, LedgerReason::Refund)
            .with_booking(booking.id)
            .with_id(Uuid::new_v5(&booking.id, b"loyalty-refund"));
        match self.post_points(tenant, entry).await {
            Ok(balance) => debug!("Refunded {} points for booking {}, balance {}", booking.points_redeemed, booking.id, balance),
            Err(CoreError::Store(StoreError::ConstraintViolation(_))) => {
                debug!("Points for booking {} already refunded", booking.id)
            }
            Err(e) => warn!("Failed to refund points for booking {}: {}", booking.id, e),
        }
    }

    /// Completion side effects; failures are logged, never returned
    async fn on_booking_completed(&self, booking: &Booking) {
        let tenant = booking.tenant_id;
        if let Err(e) = self
            .earn_for_booking(tenant, booking.customer_id, booking.id, booking.total_cents)
            .await
        {
            warn!("Failed to award loyalty points for booking {}: {}", booking.id, e);
        }
        if let Err(e) = self
            .award_action(tenant, booking.customer_id, Action::BookingCompleted)
            .await
        {
            warn!("Failed to award gamification points for booking {}: {}", booking.id, e);
        }
        if let Err(e) = self.reward_referral(tenant, booking.customer_id).await {
            warn!("Failed to reward referral for {}: {}", booking.customer_id, e);
        }
    }

    async fn notify_booking_status(&self, booking: &Booking) {
        let customer = match self.get_user(&Scope::Tenant(booking.tenant_id), booking.customer_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!("No customer profile for booking {}: {}", booking.id, e);
                return;
            }
        };
        let body = format!(
            "Your {} booking on {} is now {}.",
            booking.service_type.as_str().replace('_', " "),
            booking.scheduled_at.format("%Y-%m-%d %H:%M UTC"),
            booking.status
        );
        let notification = match customer.phone {
            Some(phone) => Notification::whatsapp(phone, body),
            None => Notification::email(customer.email, "Booking update", body),
        };
        self.notify_best_effort(notification).await;
    }

    /// Assign a provider to a booking (admins and company admins)
    pub async fn assign_provider(&self, caller: &Caller, id: Uuid, provider_id: Option<Uuid>) -> CoreResult<Booking> {
        if !(caller.role.is_admin() || caller.role == Role::CompanyAdmin) {
            return Err(CoreError::forbidden("Admin or company admin access required"));
        }
        let provider_id = required(provider_id, "provider_id")?;
        let booking = self.get_booking(caller, id).await?;
        if matches!(booking.status, BookingStatus::Completed | BookingStatus::Cancelled) {
            return Err(CoreError::validation(format!("Cannot assign a provider to a {} booking", booking.status)));
        }

        let scope = Scope::Tenant(booking.tenant_id);
        if self.provider_for_user(&scope, provider_id).await?.is_none() {
            return Err(CoreError::not_found("Provider"));
        }

        let updated = self
            .update_entity::<Booking>(
                &scope,
                id,
                serde_json::json!({"provider_id": provider_id, "updated_at": Utc::now()}),
            )
            .await?
            .ok_or_else(|| CoreError::not_found("Booking"))?;
        info!("Booking {} assigned to provider {}", id, provider_id);
        Ok(updated)
    }

    /// Review a completed booking, once, as its customer
    pub async fn add_review(&self, caller: &Caller, id: Uuid, rating: Option<u8>, comment: Option<String>) -> CoreResult<Review> {
        let tenant = caller.tenant()?;
        let scope = Scope::Tenant(tenant);
        let rating = required(rating, "rating")?;
        if !(1..=5).contains(&rating) {
            return Err(CoreError::validation("Rating must be between 1 and 5"));
        }

        let booking = self
            .get_entity::<Booking>(&scope, id)
            .await?
            .filter(|b| b.customer_id == caller.user_id)
            .ok_or_else(|| CoreError::not_found("Booking"))?;
        if booking.status != BookingStatus::Completed {
            return Err(CoreError::validation("Only completed bookings can be reviewed"));
        }
        let provider_id = booking
            .provider_id
            .ok_or_else(|| CoreError::validation("Booking has no provider"))?;

        let review = Review {
            id: Uuid::new_v5(&booking.id, b"review"),
            tenant_id: tenant,
            booking_id: booking.id,
            customer_id: caller.user_id,
            provider_id,
            rating,
            comment: comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            created_at: Utc::now(),
        };
        if self.get_entity::<Review>(&scope, review.id).await?.is_some() {
            return Err(CoreError::Conflict("Booking already reviewed".to_string()));
        }
        let review = self.insert_entity(&scope, &review).await.map_err(|e| match e {
            CoreError::Store(StoreError::ConstraintViolation(_)) => CoreError::Conflict("Booking already reviewed".to_string()),
            other => other,
        })?;

        self.refresh_provider_rating(&scope, provider_id).await?;

        if let Err(e) = self.award_action(tenant, caller.user_id, Action::ReviewPosted).await {
            warn!("Failed to award review points to {}: {}", caller.user_id, e);
        }
        Ok(review)
    }

    async fn refresh_provider_rating(&self, scope: &Scope, provider_id: UserId) -> CoreResult<()> {
        let Some(profile) = self.provider_for_user(scope, provider_id).await? else {
            return Ok(());
        };
        let reviews: Vec<Review> = self
            .select_entities(scope, RecordQuery::new().eq("provider_id", provider_id))
            .await?;
        let count = reviews.len() as u32;
        let avg = if count == 0 {
            0.0
        } else {
            let sum: u32 = reviews.iter().map(|r| r.rating as u32).sum();
            (sum as f64 / count as f64 * 100.0).round() / 100.0
        };
        self.update_entity::<super::providers::ProviderProfile>(
            scope,
            profile.id,
            serde_json::json!({"rating_avg": avg, "rating_count": count, "updated_at": Utc::now()}),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_status_parse_error_message() {
        let err = "done".parse::<BookingStatus>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid status: done");
        assert_eq!("in_progress".parse::<BookingStatus>().unwrap(), BookingStatus::InProgress);
    }

    #[test]
    fn test_service_type_parse() {
        assert_eq!("move_out".parse::<ServiceType>().unwrap(), ServiceType::MoveOut);
        assert!("laundry".parse::<ServiceType>().is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2030-01-02T10:00:00+02:00", "scheduled_at").unwrap();
        assert_eq!(ts.to_rfc3339(), "2030-01-02T08:00:00+00:00");
        assert!(parse_timestamp("tomorrow", "scheduled_at").is_err());
    }
}
