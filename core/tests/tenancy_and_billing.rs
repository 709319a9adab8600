mod common;

use chrono::{Datelike, Utc};
use common::{booking_input, create_tenant, Fixture};
use tidyhub_core::prelude::*;
use tidyhub_core::services::bookings::BookingListQuery;
use tidyhub_core::services::membership::Plan;
use tidyhub_core::services::payments::PaymentMethodInput;

#[tokio::test]
async fn test_tenants_cannot_see_each_other() {
    let fx = Fixture::new().await;
    let (_, customer) = fx.signup("ana@example.com", "customer").await;
    let booking = fx.book(&customer, booking_input(6_000)).await;

    let other = create_tenant(&fx.market, &fx.root, "rival-co").await;
    let rival_admin = Caller::new(Uuid::new_v4(), Role::Admin, other.id);

    assert!(matches!(
        fx.market.get_booking(&rival_admin, booking.id).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(fx
        .market
        .list_bookings(&rival_admin, BookingListQuery::default())
        .await
        .unwrap()
        .is_empty());
    assert!(fx.market.list_users(&rival_admin, None, None, None).await.unwrap().is_empty());

    let stats = fx.market.platform_stats(&rival_admin, None, None).await.unwrap();
    assert_eq!(stats.total_bookings, 0);

    let root_view = fx.market.root_stats(&fx.root).await.unwrap();
    let ours = root_view.iter().find(|t| t.tenant_id == fx.tenant).unwrap();
    assert_eq!(ours.bookings, 1);
    assert_eq!(root_view.len(), 2);
}

#[tokio::test]
async fn test_tenant_administration_is_root_only() {
    let fx = Fixture::new().await;
    let admin = fx.admin();

    assert!(matches!(
        fx.market.create_tenant(&admin, Some("x".into()), Some("x-co".into()), None).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        fx.market
            .create_tenant(&fx.root, Some("dup".into()), Some("sparkle-co".into()), None)
            .await,
        Err(CoreError::Conflict(_))
    ));

    let listed = fx.market.list_tenants(&fx.root).await.unwrap();
    assert_eq!(listed.len(), 1);

    let suspended = fx
        .market
        .set_tenant_status(&fx.root, fx.tenant, "suspended")
        .await
        .unwrap();
    assert!(!suspended.is_active());
    assert!(matches!(
        fx.market.ensure_tenant_active(fx.tenant).await,
        Err(CoreError::Tenant(_))
    ));
}

#[tokio::test]
async fn test_membership_subscribe_and_upgrade() {
    let fx = Fixture::new().await;
    let (_, customer) = fx.signup("ana@example.com", "customer").await;

    assert!(fx.market.current_membership(&customer).await.unwrap().is_none());
    assert!(matches!(
        fx.market.upgrade_membership(&customer, Some("premium".into())).await,
        Err(CoreError::NotFound(_))
    ));

    let membership = fx.market.subscribe(&customer, Some("plus".into())).await.unwrap();
    assert_eq!(membership.plan, Plan::Plus);
    assert!(matches!(
        fx.market.subscribe(&customer, Some("basic".into())).await,
        Err(CoreError::Conflict(_))
    ));
    assert!(matches!(
        fx.market.upgrade_membership(&customer, Some("basic".into())).await,
        Err(CoreError::Validation(msg)) if msg == "Cannot downgrade membership"
    ));

    let upgraded = fx
        .market
        .upgrade_membership(&customer, Some("premium".into()))
        .await
        .unwrap();
    assert_eq!(upgraded.membership.plan, Plan::Premium);
    assert_eq!(upgraded.membership.expires_at, membership.expires_at);
    assert_eq!(upgraded.quote.days_remaining, 365);
    assert_eq!(upgraded.quote.prorated_cents, 10_000);
}

#[tokio::test]
async fn test_single_default_payment_method() {
    let fx = Fixture::new().await;
    let (_, customer) = fx.signup("ana@example.com", "customer").await;
    let card = |last4: &str| PaymentMethodInput {
        brand: Some("Visa".to_string()),
        last4: Some(last4.to_string()),
        exp_month: Some(12),
        exp_year: Some(Utc::now().year() + 2),
    };

    let first = fx.market.add_payment_method(&customer, card("4242")).await.unwrap();
    assert!(first.is_default);
    let second = fx.market.add_payment_method(&customer, card("1881")).await.unwrap();
    assert!(!second.is_default);

    fx.market
        .set_default_payment_method(&customer, second.id)
        .await
        .unwrap();
    let methods = fx.market.list_payment_methods(&customer).await.unwrap();
    let defaults: Vec<_> = methods.iter().filter(|m| m.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, second.id);

    fx.market.remove_payment_method(&customer, second.id).await.unwrap();
    let methods = fx.market.list_payment_methods(&customer).await.unwrap();
    assert_eq!(methods.len(), 1);
    assert!(methods[0].is_default);

    let expired = PaymentMethodInput { exp_year: Some(2020), ..card("0005") };
    assert!(matches!(
        fx.market.add_payment_method(&customer, expired).await,
        Err(CoreError::Validation(_))
    ));
}

#[tokio::test]
async fn test_provider_payout_onboarding() {
    let fx = Fixture::new().await;
    let provider = fx.provider("pat@example.com").await;
    let (_, customer) = fx.signup("ana@example.com", "customer").await;

    assert!(matches!(
        fx.market.onboard_provider(&customer).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        fx.market.connect_status(&provider).await,
        Err(CoreError::NotFound(_))
    ));

    let onboarding = fx.market.onboard_provider(&provider).await.unwrap();
    assert!(onboarding.account_id.starts_with("acct_"));
    assert!(onboarding.url.ends_with(&onboarding.account_id));

    // Onboarding again reuses the same account
    let again = fx.market.onboard_provider(&provider).await.unwrap();
    assert_eq!(again.account_id, onboarding.account_id);

    assert!(!fx.market.connect_status(&provider).await.unwrap().payouts_enabled);
    assert!(fx.backends.payments.complete_onboarding(&onboarding.account_id).await);
    let status = fx.market.connect_status(&provider).await.unwrap();
    assert!(status.payouts_enabled);
    assert!(status.charges_enabled);
}
