use super::*;
use serde_json::json;
use tidyhub_core::prelude::*;

fn record(tenant: Option<TenantId>, data: serde_json::Value) -> Record {
    let id = Uuid::new_v4();
    let mut data = data;
    data["id"] = json!(id);
    data["tenant_id"] = json!(tenant);
    Record { id, tenant_id: tenant, data }
}

#[tokio::test]
async fn test_insert_and_get() {
    let store = InMemoryStore::new();
    let tenant = TenantId::new_v4();
    let scope = Scope::Tenant(tenant);

    let row = record(Some(tenant), json!({"status": "pending"}));
    store.insert(&scope, Table::Bookings, row.clone()).await.unwrap();

    let fetched = store.get(&scope, Table::Bookings, row.id).await.unwrap().unwrap();
    assert_eq!(fetched.field("status"), Some(&json!("pending")));

    let err = store.insert(&scope, Table::Bookings, row).await.unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_tenant_isolation() {
    let store = InMemoryStore::new();
    let tenant_a = TenantId::new_v4();
    let tenant_b = TenantId::new_v4();

    let row = record(Some(tenant_a), json!({"name": "a"}));
    store.insert(&Scope::Tenant(tenant_a), Table::Companies, row.clone()).await.unwrap();

    // Each tenant should only see their own rows
    assert!(store.get(&Scope::Tenant(tenant_b), Table::Companies, row.id).await.unwrap().is_none());
    assert!(store.select(&Scope::Tenant(tenant_b), Table::Companies, RecordQuery::new()).await.unwrap().is_empty());
    assert!(!store.delete(&Scope::Tenant(tenant_b), Table::Companies, row.id).await.unwrap());
    assert!(store
        .update(&Scope::Tenant(tenant_b), Table::Companies, row.id, json!({"name": "b"}))
        .await
        .unwrap()
        .is_none());

    // The service role sees everything
    assert_eq!(store.count(&Scope::Service, Table::Companies, vec![]).await.unwrap(), 1);

    // Writing into another tenant is refused
    let foreign = record(Some(tenant_b), json!({}));
    let err = store.insert(&Scope::Tenant(tenant_a), Table::Companies, foreign).await.unwrap_err();
    assert!(matches!(err, StoreError::TenantIsolationViolation(_)));
}

#[tokio::test]
async fn test_select_filters_order_and_paging() {
    let store = InMemoryStore::new();
    let tenant = TenantId::new_v4();
    let scope = Scope::Tenant(tenant);

    for (i, status) in ["pending", "completed", "completed", "cancelled"].iter().enumerate() {
        let row = record(
            Some(tenant),
            json!({"status": status, "total_cents": (i as i64 + 1) * 1000, "created_at": format!("2026-01-0{}T10:00:00.5Z", i + 1)}),
        );
        store.insert(&scope, Table::Bookings, row).await.unwrap();
    }

    let completed = store
        .select(&scope, Table::Bookings, RecordQuery::new().eq("status", "completed"))
        .await
        .unwrap();
    assert_eq!(completed.len(), 2);

    let newest_first = store
        .select(
            &scope,
            Table::Bookings,
            RecordQuery::new().order_by("created_at", Order::Desc).limit(2).offset(1),
        )
        .await
        .unwrap();
    let totals: Vec<i64> = newest_first
        .iter()
        .map(|r| r.field("total_cents").and_then(|v| v.as_i64()).unwrap())
        .collect();
    assert_eq!(totals, vec![3000, 2000]);

    // Timestamps compare as instants, not text
    let since = store
        .count(&scope, Table::Bookings, vec![Filter::gte("created_at", "2026-01-03T10:00:00Z")])
        .await
        .unwrap();
    assert_eq!(since, 2);

    let not_pending = store
        .count(&scope, Table::Bookings, vec![Filter::is_in("status", ["completed", "cancelled"])])
        .await
        .unwrap();
    assert_eq!(not_pending, 3);
}

#[tokio::test]
async fn test_update_merges_patch() {
    let store = InMemoryStore::new();
    let tenant = TenantId::new_v4();
    let scope = Scope::Tenant(tenant);
    let row = record(Some(tenant), json!({"status": "pending", "notes": "ring twice"}));
    store.insert(&scope, Table::Bookings, row.clone()).await.unwrap();

    let updated = store
        .update(&scope, Table::Bookings, row.id, json!({"status": "confirmed"}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.field("status"), Some(&json!("confirmed")));
    assert_eq!(updated.field("notes"), Some(&json!("ring twice")));

    let err = store
        .update(&scope, Table::Bookings, row.id, json!({"tenant_id": TenantId::new_v4()}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_apply_points_is_guarded() {
    let store = InMemoryStore::new();
    let tenant = TenantId::new_v4();
    let user = Uuid::new_v4();

    let entry = |delta: i64| json!({"id": Uuid::new_v4(), "tenant_id": tenant, "user_id": user, "delta": delta, "reason": "earn"});

    let balance = store
        .apply_points(&tenant, PointsDelta { user_id: user, delta: 300, entry: entry(300) })
        .await
        .unwrap();
    assert_eq!(balance, 300);

    let err = store
        .apply_points(&tenant, PointsDelta { user_id: user, delta: -500, entry: entry(-500) })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InsufficientBalance { balance: 300, required: 500 }));

    // A replayed ledger id is rejected and the balance is unchanged
    let replay = entry(100);
    store
        .apply_points(&tenant, PointsDelta { user_id: user, delta: 100, entry: replay.clone() })
        .await
        .unwrap();
    assert!(store
        .apply_points(&tenant, PointsDelta { user_id: user, delta: 100, entry: replay })
        .await
        .is_err());

    let ledger = store.count(&Scope::Tenant(tenant), Table::LoyaltyLedger, vec![]).await.unwrap();
    assert_eq!(ledger, 2);
    let account = store
        .select(&Scope::Tenant(tenant), Table::LoyaltyAccounts, RecordQuery::new().eq("user_id", user))
        .await
        .unwrap();
    assert_eq!(account[0].field("balance"), Some(&json!(400)));
    assert_eq!(account[0].field("lifetime_points"), Some(&json!(400)));
}

#[tokio::test]
async fn test_auth_round_trip() {
    let auth = InMemoryAuth::new();
    let tenant = TenantId::new_v4();
    let identity = auth
        .sign_up(SignUpRequest {
            email: "Ana@Example.com".to_string(),
            password: "correct-horse".to_string(),
            tenant_id: tenant,
            role: Role::Customer,
            full_name: "Ana".to_string(),
        })
        .await
        .unwrap();

    assert!(matches!(
        auth.sign_in("ana@example.com", "wrong").await,
        Err(tidyhub_core::errors::AuthError::InvalidCredentials)
    ));
    let session = auth.sign_in("ana@example.com", "correct-horse").await.unwrap();
    assert_eq!(auth.get_user(&session.access_token).await.unwrap(), identity);
    assert!(auth.get_user("bogus").await.is_err());
}

#[tokio::test]
async fn test_static_dns_and_notifier() {
    let dns = StaticDnsResolver::new().with_cname("Book.Example.com.", "acme.sites.tidyhub.app.");
    assert_eq!(
        dns.resolve_cname("book.example.com").await.unwrap(),
        vec!["acme.sites.tidyhub.app.".to_string()]
    );
    assert!(dns.resolve_cname("other.example.com").await.unwrap().is_empty());

    let notifier = RecordingNotifier::new();
    notifier.send(Notification::whatsapp("+351900000000", "hi")).await.unwrap();
    assert_eq!(notifier.sent().await.len(), 1);
    assert!(RecordingNotifier::unavailable()
        .send(Notification::email("a@b.co", "s", "b"))
        .await
        .is_err());
}
