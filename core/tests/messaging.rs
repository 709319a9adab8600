mod common;

use common::Fixture;
use tidyhub_core::prelude::*;
use tidyhub_core::services::accounts::SignupInput;
use tidyhub_core::services::providers::ProviderFilter;

async fn whatsapp_sent(fx: &Fixture) -> Vec<Notification> {
    fx.backends
        .notifier
        .sent()
        .await
        .into_iter()
        .filter(|n| n.channel == Channel::WhatsApp)
        .collect()
}

#[tokio::test]
async fn test_start_conversation_reuses_pair() {
    let fx = Fixture::new().await;
    let (ana, customer) = fx.signup("ana@example.com", "customer").await;
    let provider = fx.provider("pat@example.com").await;

    let first = fx
        .market
        .start_conversation(&customer, Some(provider.user_id), None)
        .await
        .unwrap();
    let again = fx
        .market
        .start_conversation(&provider, Some(ana.id), None)
        .await
        .unwrap();
    assert_eq!(first.id, again.id);
    assert!(first.includes(ana.id) && first.includes(provider.user_id));

    // A booking gives the pair a separate thread
    let booking = fx.book(&customer, common::booking_input(8_000)).await;
    let per_booking = fx
        .market
        .start_conversation(&customer, Some(provider.user_id), Some(booking.id))
        .await
        .unwrap();
    assert_ne!(per_booking.id, first.id);
    assert_eq!(per_booking.booking_id, Some(booking.id));

    assert_eq!(fx.market.list_conversations(&customer).await.unwrap().len(), 2);

    let err = fx
        .market
        .start_conversation(&customer, Some(ana.id), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_outsiders_cannot_read_or_post() {
    let fx = Fixture::new().await;
    let (_, customer) = fx.signup("ana@example.com", "customer").await;
    let provider = fx.provider("pat@example.com").await;
    let (_, outsider) = fx.signup("eve@example.com", "customer").await;

    let conversation = fx
        .market
        .start_conversation(&customer, Some(provider.user_id), None)
        .await
        .unwrap();

    let err = fx.market.list_messages(&outsider, conversation.id, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Conversation not found");

    let err = fx
        .market
        .send_message(&outsider, conversation.id, Some("hello?".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    assert!(fx.market.list_conversations(&outsider).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_send_message_updates_thread_and_notifies() {
    let fx = Fixture::new().await;
    let (_, customer) = fx.signup("ana@example.com", "customer").await;
    let (pat, provider) = fx
        .signup_with(SignupInput {
            email: Some("pat@example.com".to_string()),
            password: Some("sup3r-secret".to_string()),
            full_name: Some("Pat".to_string()),
            role: Some("provider".to_string()),
            phone: Some("+351910000000".to_string()),
            ..Default::default()
        })
        .await;

    let conversation = fx
        .market
        .start_conversation(&customer, Some(pat.id), None)
        .await
        .unwrap();
    assert!(conversation.last_message_at.is_none());

    let message = fx
        .market
        .send_message(&customer, conversation.id, Some("  Can you bring a ladder?  ".to_string()))
        .await
        .unwrap();
    assert_eq!(message.body, "Can you bring a ladder?");

    let threads = fx.market.list_conversations(&provider).await.unwrap();
    assert_eq!(threads[0].last_message_at, Some(message.created_at));

    let sent = whatsapp_sent(&fx).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "+351910000000");

    // The customer has no phone, so the reply goes unannounced
    fx.market
        .send_message(&provider, conversation.id, Some("Yes".to_string()))
        .await
        .unwrap();
    assert_eq!(whatsapp_sent(&fx).await.len(), 1);

    let messages = fx.market.list_messages(&provider, conversation.id, None).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender_id, customer.user_id);
}

#[tokio::test]
async fn test_broadcast_requires_admin() {
    let fx = Fixture::new().await;
    let (_, customer) = fx.signup("ana@example.com", "customer").await;

    let err = fx
        .market
        .broadcast_whatsapp(&customer, Some("+351910000000".to_string()), Some("Promo".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert!(whatsapp_sent(&fx).await.is_empty());

    let receipt = fx
        .market
        .broadcast_whatsapp(&fx.admin(), Some("+351910000000".to_string()), Some("Promo".to_string()))
        .await
        .unwrap();
    assert!(!receipt.provider_message_id.is_empty());
    assert_eq!(whatsapp_sent(&fx).await.len(), 1);
}

#[tokio::test]
async fn test_verify_provider() {
    let fx = Fixture::new().await;
    fx.provider("pat@example.com").await;
    let (_, customer) = fx.signup("ana@example.com", "customer").await;

    let profile = fx
        .market
        .list_providers(fx.tenant, ProviderFilter::default())
        .await
        .unwrap()
        .remove(0);
    assert!(!profile.verified);

    let err = fx.market.verify_provider(&customer, profile.id, Some(true)).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let verified = fx.market.verify_provider(&fx.admin(), profile.id, None).await.unwrap();
    assert!(verified.verified);

    let listed = fx
        .market
        .list_providers(
            fx.tenant,
            ProviderFilter {
                verified: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let err = fx.market.verify_provider(&fx.admin(), Uuid::new_v4(), Some(true)).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}
