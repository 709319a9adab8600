mod common;

use base64::Engine;
use chrono::{Duration, Utc};
use common::{booking_input, Fixture};
use tidyhub_adapter_in_memory::StaticDnsResolver;
use tidyhub_core::prelude::*;
use tidyhub_core::services::bookings::{BookingInput, BookingListQuery};
use tidyhub_core::services::claims::{ClaimInput, ClaimReview, ClaimStatus, PhotoUpload};
use tidyhub_core::services::companies::{CompanyInput, MemberRole};

fn company_input(name: &str, slug: &str) -> CompanyInput {
    CompanyInput {
        name: Some(name.to_string()),
        slug: Some(slug.to_string()),
        contact_email: Some("Office@Sparkle.example".to_string()),
    }
}

#[tokio::test]
async fn test_company_members_and_bookings() {
    let fx = Fixture::new().await;
    let owner = Caller::new(Uuid::new_v4(), Role::CompanyAdmin, fx.tenant);
    let provider = fx.provider("pat@example.com").await;
    let (_, customer) = fx.signup("ana@example.com", "customer").await;

    let company = fx
        .market
        .create_company(&owner, company_input("Sparkle", "sparkle"))
        .await
        .unwrap();
    assert_eq!(company.contact_email.as_deref(), Some("office@sparkle.example"));
    assert!(matches!(
        fx.market.create_company(&owner, company_input("Sparkle 2", "sparkle")).await,
        Err(CoreError::Conflict(_))
    ));

    let member = fx
        .market
        .add_member(&owner, company.id, Some(provider.user_id), Some("manager".to_string()))
        .await
        .unwrap();
    assert_eq!(member.role, MemberRole::Manager);
    assert!(matches!(
        fx.market.add_member(&owner, company.id, Some(provider.user_id), None).await,
        Err(CoreError::Conflict(_))
    ));
    assert!(matches!(
        fx.market.add_member(&owner, company.id, Some(customer.user_id), None).await,
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        fx.market.list_members(&customer, company.id).await,
        Err(CoreError::Forbidden(_))
    ));

    let booking = fx
        .book(
            &customer,
            BookingInput {
                company_id: Some(company.id),
                ..booking_input(12_000)
            },
        )
        .await;
    let visible = fx.market.list_bookings(&owner, BookingListQuery::default()).await.unwrap();
    assert_eq!(visible.len(), 1);

    let assigned = fx
        .market
        .assign_provider(&owner, booking.id, Some(provider.user_id))
        .await
        .unwrap();
    assert_eq!(assigned.provider_id, Some(provider.user_id));
    fx.complete(&provider, &booking).await;

    let stats = fx.market.company_stats(&owner, company.id).await.unwrap();
    assert_eq!(stats.total_bookings, 1);
    assert_eq!(stats.completed_bookings, 1);
    assert_eq!(stats.revenue_cents, 12_000);
    assert_eq!(stats.provider_count, 1);

    assert!(fx.market.remove_member(&owner, company.id, provider.user_id).await.unwrap());
    assert!(fx.market.list_members(&owner, company.id).await.unwrap().is_empty());
    assert!(matches!(
        fx.market.remove_member(&owner, company.id, provider.user_id).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_custom_domain_verification() {
    let dns = StaticDnsResolver::new().with_cname("book.sparkle.example", "Sparkle.Sites.TidyHub.App.");
    let fx = Fixture::with_dns(dns).await;
    let owner = Caller::new(Uuid::new_v4(), Role::CompanyAdmin, fx.tenant);

    let sparkle = fx
        .market
        .create_company(&owner, company_input("Sparkle", "sparkle"))
        .await
        .unwrap();
    let shine = fx
        .market
        .create_company(&owner, company_input("Shine", "shine"))
        .await
        .unwrap();

    assert!(matches!(
        fx.market.verify_domain(&owner, sparkle.id).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        fx.market.set_domain(&owner, sparkle.id, Some("not a host".to_string())).await,
        Err(CoreError::Validation(_))
    ));

    let domain = fx
        .market
        .set_domain(&owner, sparkle.id, Some("Book.Sparkle.example".to_string()))
        .await
        .unwrap();
    assert_eq!(domain.domain, "book.sparkle.example");
    assert_eq!(domain.cname_target, "sparkle.sites.tidyhub.app");
    assert!(!domain.verified);

    let result = fx.market.verify_domain(&owner, sparkle.id).await.unwrap();
    assert!(result.verified);
    assert_eq!(result.found, vec!["Sparkle.Sites.TidyHub.App.".to_string()]);

    fx.market
        .set_domain(&owner, shine.id, Some("www.shine.example".to_string()))
        .await
        .unwrap();
    let result = fx.market.verify_domain(&owner, shine.id).await.unwrap();
    assert!(!result.verified);
    assert!(result.found.is_empty());
}

#[tokio::test]
async fn test_claim_lifecycle() {
    let fx = Fixture::new().await;
    let (_, customer) = fx.signup("ana@example.com", "customer").await;
    let (_, stranger) = fx.signup("bo@example.com", "customer").await;
    let admin = fx.admin();
    let booking = fx.book(&customer, booking_input(8_000)).await;

    let input = || ClaimInput {
        booking_id: Some(booking.id),
        claim_type: Some("damage".to_string()),
        description: Some("Vase knocked over".to_string()),
        amount_claimed_cents: Some(15_000),
        incident_date: Some((Utc::now() - Duration::hours(3)).to_rfc3339()),
    };

    assert!(matches!(
        fx.market.file_claim(&stranger, input()).await,
        Err(CoreError::NotFound(_))
    ));
    let claim = fx.market.file_claim(&customer, input()).await.unwrap();
    assert_eq!(claim.status, ClaimStatus::Submitted);
    assert!(matches!(
        fx.market.file_claim(&customer, input()).await,
        Err(CoreError::Conflict(_))
    ));

    let png = base64::engine::general_purpose::STANDARD.encode(b"\x89PNG\r\n\x1a\nfake");
    let photo = fx
        .market
        .upload_claim_photo(
            &customer,
            claim.id,
            PhotoUpload {
                data: Some(format!("data:image/png;base64,{}", png)),
                content_type: Some("image/png".to_string()),
            },
        )
        .await
        .unwrap();
    assert!(photo.storage_path.starts_with(&format!("claims/{}/{}/", fx.tenant, claim.id)));
    assert!(photo.storage_path.ends_with(".png"));
    assert_eq!(photo.url, format!("memory://claims/{}", photo.storage_path));
    assert!(fx.backends.storage.object(&photo.storage_path).await.is_some());

    let review = |status: &str, amount: Option<i64>| ClaimReview {
        status: Some(status.to_string()),
        amount_approved_cents: amount,
        resolution_notes: None,
    };
    assert!(matches!(
        fx.market.review_claim(&customer, claim.id, review("under_review", None)).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        fx.market.review_claim(&admin, claim.id, review("approved", Some(5_000))).await,
        Err(CoreError::Validation(_))
    ));
    fx.market
        .review_claim(&admin, claim.id, review("under_review", None))
        .await
        .unwrap();
    assert!(matches!(
        fx.market.review_claim(&admin, claim.id, review("approved", Some(20_000))).await,
        Err(CoreError::Validation(_))
    ));
    let approved = fx
        .market
        .review_claim(&admin, claim.id, review("approved", Some(10_000)))
        .await
        .unwrap();
    assert_eq!(approved.amount_approved_cents, Some(10_000));

    let notices = fx.backends.notifier.sent().await;
    assert!(notices
        .iter()
        .any(|n| n.to == "ana@example.com" && n.body.contains("approved")));

    assert_eq!(fx.market.list_claims(&customer, None, None).await.unwrap().len(), 1);
    assert!(fx.market.list_claims(&stranger, None, None).await.unwrap().is_empty());
    assert_eq!(fx.market.list_claims(&admin, Some("approved"), None).await.unwrap().len(), 1);
}
