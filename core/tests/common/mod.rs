#![allow(dead_code)]

use chrono::{Duration, Utc};
use tidyhub_adapter_in_memory::{InMemoryBackends, StaticDnsResolver};
use tidyhub_core::prelude::*;
use tidyhub_core::services::accounts::{SignupInput, UserProfile};
use tidyhub_core::services::bookings::{Booking, BookingInput};
use tidyhub_core::services::providers::ProfileInput;
use tidyhub_core::tenant::TenantInfo;

pub struct Fixture {
    pub backends: InMemoryBackends,
    pub market: Marketplace,
    pub tenant: TenantId,
    pub root: Caller,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_dns(StaticDnsResolver::new()).await
    }

    pub async fn with_dns(dns: StaticDnsResolver) -> Self {
        let backends = InMemoryBackends::with_dns(dns);
        let market = backends.marketplace();
        let root = Caller {
            user_id: Uuid::new_v4(),
            role: Role::RootAdmin,
            tenant: None,
        };
        let tenant = create_tenant(&market, &root, "sparkle-co").await.id;
        Self {
            backends,
            market,
            tenant,
            root,
        }
    }

    pub fn admin(&self) -> Caller {
        Caller::new(Uuid::new_v4(), Role::Admin, self.tenant)
    }

    /// Sign up a user and return the profile plus a caller acting as them
    pub async fn signup(&self, email: &str, role: &str) -> (UserProfile, Caller) {
        self.signup_with(SignupInput {
            email: Some(email.to_string()),
            password: Some("sup3r-secret".to_string()),
            full_name: Some(email.split('@').next().unwrap_or(email).to_string()),
            role: Some(role.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn signup_with(&self, input: SignupInput) -> (UserProfile, Caller) {
        let profile = self.market.signup(self.tenant, input).await.unwrap();
        let caller = Caller::new(profile.id, profile.role, self.tenant);
        (profile, caller)
    }

    /// A provider with a directory profile
    pub async fn provider(&self, email: &str) -> Caller {
        let (_, caller) = self.signup(email, "provider").await;
        self.market
            .upsert_provider_profile(
                &caller,
                ProfileInput {
                    display_name: Some("Shiny Floors".to_string()),
                    bio: None,
                    hourly_rate_cents: Some(2_500),
                    services: vec!["standard".to_string(), "deep".to_string()],
                    service_areas: vec!["Lisbon".to_string()],
                },
            )
            .await
            .unwrap();
        caller
    }

    pub async fn book(&self, customer: &Caller, input: BookingInput) -> Booking {
        self.market.create_booking(customer, input).await.unwrap()
    }

    /// Walk a booking through to completion as its provider
    pub async fn complete(&self, provider: &Caller, booking: &Booking) -> Booking {
        let mut latest = booking.clone();
        for status in ["confirmed", "in_progress", "completed"] {
            latest = self
                .market
                .update_booking_status(provider, booking.id, Some(status.to_string()))
                .await
                .unwrap();
        }
        latest
    }
}

pub async fn create_tenant(market: &Marketplace, root: &Caller, slug: &str) -> TenantInfo {
    market
        .create_tenant(root, Some(format!("{} tenant", slug)), Some(slug.to_string()), None)
        .await
        .unwrap()
}

/// A valid booking request scheduled two days from now
pub fn booking_input(subtotal_cents: i64) -> BookingInput {
    BookingInput {
        service_type: Some("standard".to_string()),
        scheduled_at: Some((Utc::now() + Duration::days(2)).to_rfc3339()),
        duration_hours: Some(3),
        address: Some("Rua das Flores 12, Lisboa".to_string()),
        subtotal_cents: Some(subtotal_cents),
        ..Default::default()
    }
}
