mod common;

use common::{create_tenant, Fixture};
use tidyhub_core::prelude::*;
use tidyhub_core::services::accounts::{SignupInput, UserProfile};
use tidyhub_core::services::loyalty::{referral_code_for, ReferralStatus};

fn signup_input(email: &str) -> SignupInput {
    SignupInput {
        email: Some(email.to_string()),
        password: Some("sup3r-secret".to_string()),
        full_name: Some("Test User".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_signup_creates_profile_and_loyalty_account() {
    let fx = Fixture::new().await;
    let (profile, caller) = fx.signup("Ana@Example.com", "customer").await;

    assert_eq!(profile.email, "ana@example.com");
    assert_eq!(profile.role, Role::Customer);
    assert_eq!(profile.referral_code.len(), 8);

    let summary = fx.market.loyalty_summary(&caller).await.unwrap();
    assert_eq!(summary.balance, 0);
    assert_eq!(fx.market.session(&caller).await.unwrap().id, profile.id);

    let welcome = fx.backends.notifier.sent().await;
    assert_eq!(welcome.len(), 1);
    assert_eq!(welcome[0].to, "ana@example.com");
}

#[tokio::test]
async fn test_signup_rejections() {
    let fx = Fixture::new().await;
    fx.signup("ana@example.com", "customer").await;

    let duplicate = fx.market.signup(fx.tenant, signup_input("ana@example.com")).await;
    assert!(matches!(duplicate, Err(CoreError::Conflict(_))));

    let short = SignupInput {
        password: Some("short".to_string()),
        ..signup_input("bo@example.com")
    };
    assert!(matches!(
        fx.market.signup(fx.tenant, short).await,
        Err(CoreError::Validation(_))
    ));

    let admin = SignupInput {
        role: Some("admin".to_string()),
        ..signup_input("eve@example.com")
    };
    assert!(matches!(
        fx.market.signup(fx.tenant, admin).await,
        Err(CoreError::Validation(_))
    ));

    let unknown_tenant = fx.market.signup(TenantId::new_v4(), signup_input("cy@example.com")).await;
    assert!(matches!(unknown_tenant, Err(CoreError::Tenant(_))));
}

#[tokio::test]
async fn test_suspended_tenant_refuses_signup() {
    let fx = Fixture::new().await;
    fx.market
        .set_tenant_status(&fx.root, fx.tenant, "suspended")
        .await
        .unwrap();

    let result = fx.market.signup(fx.tenant, signup_input("ana@example.com")).await;
    assert!(matches!(result, Err(CoreError::Tenant(_))));
}

#[tokio::test]
async fn test_login_is_bound_to_the_tenant() {
    let fx = Fixture::new().await;
    let (profile, _) = fx.signup("ana@example.com", "customer").await;
    let other = create_tenant(&fx.market, &fx.root, "other-co").await;

    let password = Some("sup3r-secret".to_string());
    let session = fx
        .market
        .login(fx.tenant, Some("ana@example.com".to_string()), password.clone())
        .await
        .unwrap();
    let identity = fx.market.authenticate(&session.access_token).await.unwrap();
    assert_eq!(identity.id, profile.id);

    let elsewhere = fx
        .market
        .login(other.id, Some("ana@example.com".to_string()), password)
        .await;
    assert!(matches!(elsewhere, Err(CoreError::Unauthorized)));

    let wrong = fx
        .market
        .login(fx.tenant, Some("ana@example.com".to_string()), Some("nope-nope".to_string()))
        .await;
    assert!(matches!(wrong, Err(CoreError::Unauthorized)));

    assert!(matches!(
        fx.market.authenticate("not-a-token").await,
        Err(CoreError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_password_reset_does_not_reveal_accounts() {
    let fx = Fixture::new().await;
    fx.market
        .request_password_reset(Some("nobody@example.com".to_string()))
        .await
        .unwrap();
    assert_eq!(fx.backends.auth.reset_requests().await, vec!["nobody@example.com"]);
}

#[tokio::test]
async fn test_referral_codes_stay_unique_in_tenant() {
    let fx = Fixture::new().await;
    let newcomer = Uuid::new_v4();
    let holder = UserProfile {
        id: Uuid::new_v4(),
        tenant_id: fx.tenant,
        email: "holder@example.com".to_string(),
        full_name: "Holder".to_string(),
        role: Role::Customer,
        phone: None,
        referral_code: referral_code_for(newcomer, 0),
        created_at: Utc::now(),
    };
    fx.backends
        .store
        .insert(&Scope::Tenant(fx.tenant), Table::Users, Record::from_entity(&holder).unwrap())
        .await
        .unwrap();

    let code = fx.market.unique_referral_code(fx.tenant, newcomer).await.unwrap();
    assert_ne!(code, holder.referral_code);
    assert_eq!(code, referral_code_for(newcomer, 1));

    // Another tenant can reuse the code
    let other = create_tenant(&fx.market, &fx.root, "other-co").await.id;
    let code = fx.market.unique_referral_code(other, newcomer).await.unwrap();
    assert_eq!(code, holder.referral_code);
}

#[tokio::test]
async fn test_referral_rewards_both_sides_once() {
    let fx = Fixture::new().await;
    let (referrer, referrer_caller) = fx.signup("ana@example.com", "customer").await;
    let (referee, referee_caller) = fx
        .signup_with(SignupInput {
            referral_code: Some(referrer.referral_code.to_lowercase()),
            ..signup_input("bo@example.com")
        })
        .await;

    let again = fx.market.apply_referral_code(&referee_caller, &referrer.referral_code).await;
    assert!(matches!(again, Err(CoreError::Conflict(_))));
    let own = fx.market.apply_referral_code(&referrer_caller, &referrer.referral_code).await;
    assert!(matches!(own, Err(CoreError::Validation(_))));

    let rewarded = fx.market.reward_referral(fx.tenant, referee.id).await.unwrap().unwrap();
    assert_eq!(rewarded.status, ReferralStatus::Rewarded);
    assert!(fx.market.reward_referral(fx.tenant, referee.id).await.unwrap().is_none());

    assert_eq!(fx.market.loyalty_summary(&referrer_caller).await.unwrap().balance, 500);
    assert_eq!(fx.market.loyalty_summary(&referee_caller).await.unwrap().balance, 250);
    assert_eq!(fx.market.points_summary(&referrer_caller).await.unwrap().total, 100);
}

#[tokio::test]
async fn test_role_changes() {
    let fx = Fixture::new().await;
    let (profile, customer) = fx.signup("ana@example.com", "customer").await;
    let admin = fx.admin();

    let grant = fx.market.set_user_role(&admin, profile.id, Some("admin".to_string())).await;
    assert!(matches!(grant, Err(CoreError::Forbidden(_))));
    assert!(matches!(
        fx.market.set_user_role(&customer, profile.id, Some("provider".to_string())).await,
        Err(CoreError::Forbidden(_))
    ));

    let updated = fx
        .market
        .set_user_role(&fx.root, profile.id, Some("company_admin".to_string()))
        .await
        .unwrap();
    assert_eq!(updated.role, Role::CompanyAdmin);

    let listed = fx.market.list_users(&admin, Some("company_admin"), None, None).await.unwrap();
    assert_eq!(listed.len(), 1);
}
