//! Customer/provider conversations and admin broadcasts

use super::{page_limit, required, required_str, Caller, Marketplace};
use crate::errors::{CoreError, CoreResult};
use crate::traits::{DeliveryReceipt, Notification};
use crate::types::{Entity, Order, RecordQuery, Scope, Table, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Longest accepted message body, in characters
pub const MAX_MESSAGE_CHARS: usize = 4_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub tenant_id: TenantId,
    /// Sorted so a pair always has the same representation
    pub participant_ids: [UserId; 2],
    pub booking_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Conversation {
    const TABLE: Table = Table::Conversations;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

impl Conversation {
    pub fn includes(&self, user_id: UserId) -> bool {
        self.participant_ids.contains(&user_id)
    }

    pub fn other_participant(&self, user_id: UserId) -> UserId {
        if self.participant_ids[0] == user_id {
            self.participant_ids[1]
        } else {
            self.participant_ids[0]
        }
    }
}

/// Conversation id for a pair of users, optionally tied to a booking
pub fn conversation_id(a: UserId, b: UserId, booking_id: Option<Uuid>) -> Uuid {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut name = Vec::with_capacity(48);
    name.extend_from_slice(second.as_bytes());
    if let Some(booking) = booking_id {
        name.extend_from_slice(booking.as_bytes());
    }
    Uuid::new_v5(&first, &name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub conversation_id: Uuid,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Message {
    const TABLE: Table = Table::Messages;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

/// Trim and bound a message body
pub fn validate_body(body: &str) -> CoreResult<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(CoreError::MissingField("body"));
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(CoreError::validation(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(body.to_string())
}

impl Marketplace {
    /// Open a conversation with another user of the tenant, or return the
    /// existing one for the same pair and booking
    pub async fn start_conversation(
        &self,
        caller: &Caller,
        participant_id: Option<Uuid>,
        booking_id: Option<Uuid>,
    ) -> CoreResult<Conversation> {
        let tenant = caller.tenant()?;
        let scope = Scope::Tenant(tenant);
        let other = required(participant_id, "participant_id")?;
        if other == caller.user_id {
            return Err(CoreError::validation("Cannot start a conversation with yourself"));
        }
        self.get_user(&scope, other).await?;

        let id = conversation_id(caller.user_id, other, booking_id);
        if let Some(existing) = self.get_entity::<Conversation>(&scope, id).await? {
            return Ok(existing);
        }

        let mut participants = [caller.user_id, other];
        participants.sort();
        let conversation = Conversation {
            id,
            tenant_id: tenant,
            participant_ids: participants,
            booking_id,
            last_message_at: None,
            created_at: Utc::now(),
        };
        let conversation = self.insert_entity(&scope, &conversation).await?;
        debug!("Conversation {} started by {}", conversation.id, caller.user_id);
        Ok(conversation)
    }

    /// Conversations the caller takes part in, most recently active first
    pub async fn list_conversations(&self, caller: &Caller) -> CoreResult<Vec<Conversation>> {
        let all: Vec<Conversation> = self
            .select_entities(&Scope::Tenant(caller.tenant()?), RecordQuery::new())
            .await?;
        let mut mine: Vec<Conversation> = all.into_iter().filter(|c| c.includes(caller.user_id)).collect();
        mine.sort_by(|a, b| {
            b.last_message_at
                .unwrap_or(b.created_at)
                .cmp(&a.last_message_at.unwrap_or(a.created_at))
        });
        Ok(mine)
    }

    async fn participant_conversation(&self, caller: &Caller, id: Uuid) -> CoreResult<Conversation> {
        self.get_entity::<Conversation>(&Scope::Tenant(caller.tenant()?), id)
            .await?
            .filter(|c| c.includes(caller.user_id))
            .ok_or_else(|| CoreError::not_found("Conversation"))
    }

    /// Messages in a conversation, oldest first
    pub async fn list_messages(&self, caller: &Caller, conversation_id: Uuid, limit: Option<u32>) -> CoreResult<Vec<Message>> {
        let conversation = self.participant_conversation(caller, conversation_id).await?;
        let query = RecordQuery::new()
            .eq("conversation_id", conversation.id)
            .order_by("created_at", Order::Asc)
            .limit(page_limit(limit));
        self.select_entities(&Scope::Tenant(conversation.tenant_id), query).await
    }

    pub async fn send_message(&self, caller: &Caller, conversation_id: Uuid, body: Option<String>) -> CoreResult<Message> {
        let conversation = self.participant_conversation(caller, conversation_id).await?;
        let body = validate_body(&body.unwrap_or_default())?;
        let scope = Scope::Tenant(conversation.tenant_id);

        let message = Message {
            id: Uuid::new_v4(),
            tenant_id: conversation.tenant_id,
            conversation_id: conversation.id,
            sender_id: caller.user_id,
            body,
            created_at: Utc::now(),
        };
        let message = self.insert_entity(&scope, &message).await?;
        self.update_entity::<Conversation>(
            &scope,
            conversation.id,
            serde_json::json!({"last_message_at": message.created_at}),
        )
        .await?;

        let recipient = conversation.other_participant(caller.user_id);
        match self.get_user(&scope, recipient).await {
            Ok(profile) => {
                if let Some(phone) = profile.phone {
                    self.notify_best_effort(Notification::whatsapp(phone, "You have a new message on TidyHub."))
                        .await;
                }
            }
            Err(e) => warn!("No profile for message recipient {}: {}", recipient, e),
        }
        Ok(message)
    }

    /// Send a WhatsApp message directly (admin only)
    pub async fn broadcast_whatsapp(&self, caller: &Caller, to: Option<String>, body: Option<String>) -> CoreResult<DeliveryReceipt> {
        caller.require_admin()?;
        let to = required_str(to, "to")?;
        let body = validate_body(&required_str(body, "body")?)?;
        let receipt = self.notifier.send(Notification::whatsapp(to, body)).await?;
        info!("WhatsApp message {} sent by {}", receipt.provider_message_id, caller.user_id);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_is_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let booking = Uuid::new_v4();
        assert_eq!(conversation_id(a, b, None), conversation_id(b, a, None));
        assert_eq!(conversation_id(a, b, Some(booking)), conversation_id(b, a, Some(booking)));
        assert_ne!(conversation_id(a, b, None), conversation_id(a, b, Some(booking)));
    }

    #[test]
    fn test_validate_body() {
        assert_eq!(validate_body("  hello ").unwrap(), "hello");
        assert_eq!(validate_body("   ").unwrap_err().to_string(), "Missing required field: body");
        assert!(validate_body(&"x".repeat(MAX_MESSAGE_CHARS)).is_ok());
        assert!(validate_body(&"x".repeat(MAX_MESSAGE_CHARS + 1)).is_err());
    }
}
