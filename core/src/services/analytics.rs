//! Back-office statistics

use super::bookings::{parse_timestamp, Booking, BookingStatus};
use super::claims::ClaimStatus;
use super::{Caller, Marketplace};
use crate::errors::{CoreError, CoreResult};
use crate::tenant::{TenantInfo, TenantStatus};
use crate::types::{Filter, Order, RecordQuery, Role, Scope, Table, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub total_bookings: u64,
    pub by_status: BTreeMap<String, u64>,
    pub gross_revenue_cents: i64,
    pub average_booking_value_cents: i64,
    pub active_providers: u64,
    pub new_customers: u64,
    pub open_claims: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantStats {
    pub tenant_id: TenantId,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    pub bookings: u64,
    pub users: u64,
}

/// Booking totals: count, per-status counts, completed revenue and its mean
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingSummary {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub gross_revenue_cents: i64,
    pub average_value_cents: i64,
}

pub fn summarize_bookings(bookings: &[Booking]) -> BookingSummary {
    let mut summary = BookingSummary {
        total: bookings.len() as u64,
        ..Default::default()
    };
    let mut completed = 0i64;
    for booking in bookings {
        *summary.by_status.entry(booking.status.to_string()).or_insert(0) += 1;
        if booking.status == BookingStatus::Completed {
            completed += 1;
            summary.gross_revenue_cents += booking.total_cents;
        }
    }
    if completed > 0 {
        summary.average_value_cents = (summary.gross_revenue_cents as f64 / completed as f64).round() as i64;
    }
    summary
}

fn parse_range(from: Option<&str>, to: Option<&str>) -> CoreResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let from = from.filter(|s| !s.is_empty()).map(|s| parse_timestamp(s, "from")).transpose()?;
    let to = to.filter(|s| !s.is_empty()).map(|s| parse_timestamp(s, "to")).transpose()?;
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            return Err(CoreError::validation("from must not be after to"));
        }
    }
    Ok((from, to))
}

fn range_filters(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Vec<Filter> {
    let mut filters = Vec::new();
    if let Some(from) = from {
        filters.push(Filter::gte("created_at", from));
    }
    if let Some(to) = to {
        filters.push(Filter::lte("created_at", to));
    }
    filters
}

impl Marketplace {
    /// Tenant-level dashboard numbers (admins; root without tenant sees the platform)
    pub async fn platform_stats(&self, caller: &Caller, from: Option<&str>, to: Option<&str>) -> CoreResult<PlatformStats> {
        caller.require_admin()?;
        let (from, to) = parse_range(from, to)?;
        let scope = caller.scope();

        let mut query = RecordQuery::new();
        for filter in range_filters(from, to) {
            query = query.filter(filter);
        }
        let bookings: Vec<Booking> = self.select_entities(&scope, query).await?;
        let summary = summarize_bookings(&bookings);

        let active_providers = self
            .store
            .count(&scope, Table::ProviderProfiles, vec![Filter::eq("verified", true)])
            .await?;

        let mut customer_filters = vec![Filter::eq("role", Role::Customer)];
        customer_filters.extend(range_filters(from, to));
        let new_customers = self.store.count(&scope, Table::Users, customer_filters).await?;

        let open = [ClaimStatus::Submitted, ClaimStatus::UnderReview, ClaimStatus::Approved];
        let open_claims = self
            .store
            .count(&scope, Table::InsuranceClaims, vec![Filter::is_in("status", open)])
            .await?;

        Ok(PlatformStats {
            from,
            to,
            total_bookings: summary.total,
            by_status: summary.by_status,
            gross_revenue_cents: summary.gross_revenue_cents,
            average_booking_value_cents: summary.average_value_cents,
            active_providers,
            new_customers,
            open_claims,
        })
    }

    /// Booking and user counts per tenant (root only)
    pub async fn root_stats(&self, caller: &Caller) -> CoreResult<Vec<TenantStats>> {
        caller.require_root()?;
        let tenants: Vec<TenantInfo> = self
            .select_entities(&Scope::Service, RecordQuery::new().order_by("created_at", Order::Asc))
            .await?;

        let mut stats = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            let scope = Scope::Tenant(tenant.id);
            let bookings = self.store.count(&scope, Table::Bookings, Vec::new()).await?;
            let users = self.store.count(&scope, Table::Users, Vec::new()).await?;
            stats.push(TenantStats {
                tenant_id: tenant.id,
                name: tenant.name,
                slug: tenant.slug,
                status: tenant.status,
                bookings,
                users,
            });
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::bookings::ServiceType;
    use uuid::Uuid;

    fn booking(status: BookingStatus, total_cents: i64) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            tenant_id: TenantId::new_v4(),
            customer_id: Uuid::new_v4(),
            provider_id: None,
            company_id: None,
            service_type: ServiceType::Standard,
            scheduled_at: now,
            duration_hours: 2,
            address: "1 Main St".into(),
            subtotal_cents: total_cents,
            points_redeemed: 0,
            discount_cents: 0,
            total_cents,
            status,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_summarize_bookings() {
        let bookings = vec![
            booking(BookingStatus::Completed, 10_000),
            booking(BookingStatus::Completed, 5_001),
            booking(BookingStatus::Pending, 99_999),
            booking(BookingStatus::Cancelled, 4_000),
        ];
        let summary = summarize_bookings(&bookings);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.gross_revenue_cents, 15_001);
        assert_eq!(summary.average_value_cents, 7_501);
        assert_eq!(summary.by_status.get("completed"), Some(&2));
        assert_eq!(summary.by_status.get("pending"), Some(&1));
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize_bookings(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average_value_cents, 0);
    }

    #[test]
    fn test_parse_range() {
        assert!(parse_range(Some("2026-02-01T00:00:00Z"), Some("2026-01-01T00:00:00Z")).is_err());
        let (from, to) = parse_range(Some("2026-01-01T00:00:00Z"), None).unwrap();
        assert!(from.is_some() && to.is_none());
    }
}
