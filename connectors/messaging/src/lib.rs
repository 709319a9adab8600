//! WhatsApp Cloud and transactional email connector for TidyHub notifications

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::{Duration, Instant};
use tidyhub_core::prelude::*;
use tracing::{debug, error, info};

mod config;
mod models;

pub use config::{EmailConfig, MessagingConfig, WhatsAppConfig};
use models::*;

/// Notifier that delivers over the WhatsApp Cloud API and an email API
pub struct MessagingConnector {
    client: Client,
    config: MessagingConfig,
}

impl MessagingConnector {
    /// Create a new messaging connector
    pub fn new(config: MessagingConfig) -> Result<Self, NotifyError> {
        let timeout_ms = [
            config.whatsapp.as_ref().map(|c| c.timeout_ms),
            config.email.as_ref().map(|c| c.timeout_ms),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(15_000);

        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| NotifyError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Normalize a phone number to the digits-only form the Cloud API takes
    fn normalize_phone(raw: &str) -> Result<String, NotifyError> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
            .collect();
        let digits = digits.strip_prefix('+').unwrap_or(&digits);

        if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(NotifyError::InvalidRecipient(raw.to_string()));
        }
        Ok(digits.to_string())
    }

    async fn send_whatsapp(&self, to: &str, body: String) -> Result<String, NotifyError> {
        let config = self
            .config
            .whatsapp
            .as_ref()
            .ok_or_else(|| NotifyError::ChannelUnavailable("whatsapp".to_string()))?;
        let to = Self::normalize_phone(to)?;

        let url = format!("{}/{}/messages", config.api_base, config.phone_number_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&config.access_token)
            .json(&WhatsAppRequest::text(to, body))
            .send()
            .await
            .map_err(|e| NotifyError::NetworkError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GraphErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            error!("WhatsApp API error {}: {}", status, message);
            return Err(NotifyError::ApiError(format!("WhatsApp API error {}: {}", status, message)));
        }

        let parsed: WhatsAppResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::ApiError(format!("Failed to parse WhatsApp response: {}", e)))?;
        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| NotifyError::ApiError("WhatsApp response had no message id".to_string()))
    }

    async fn send_email(&self, to: &str, subject: String, text: String) -> Result<String, NotifyError> {
        let config = self
            .config
            .email
            .as_ref()
            .ok_or_else(|| NotifyError::ChannelUnavailable("email".to_string()))?;
        if !to.contains('@') {
            return Err(NotifyError::InvalidRecipient(to.to_string()));
        }

        let request = EmailRequest {
            from: config.from.clone(),
            to: vec![to.to_string()],
            subject,
            text,
        };
        let response = self
            .client
            .post(format!("{}/emails", config.api_base))
            .bearer_auth(&config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::NetworkError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Email API error {}: {}", status, error_text);
            return Err(NotifyError::ApiError(format!("Email API error {}: {}", status, error_text)));
        }

        let parsed: EmailResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::ApiError(format!("Failed to parse email response: {}", e)))?;
        Ok(parsed.id)
    }
}

#[async_trait]
impl Notifier for MessagingConnector {
    async fn send(&self, notification: Notification) -> Result<DeliveryReceipt, NotifyError> {
        let start = Instant::now();
        let Notification { channel, to, subject, body } = notification;

        let provider_message_id = match channel {
            Channel::WhatsApp => self.send_whatsapp(&to, body).await?,
            Channel::Email => {
                let subject = subject.unwrap_or_else(|| "TidyHub".to_string());
                self.send_email(&to, subject, body).await?
            }
        };

        info!("Delivered {:?} notification in {}ms", channel, start.elapsed().as_millis());
        debug!("Provider message id {}", provider_message_id);
        Ok(DeliveryReceipt {
            channel,
            provider_message_id,
            accepted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connector_for(server: &MockServer) -> MessagingConnector {
        let config = MessagingConfig::new()
            .with_whatsapp(WhatsAppConfig::new("10950", "wa-token").with_api_base(server.uri()))
            .with_email(EmailConfig::new("re_key", "TidyHub <no-reply@tidyhub.app>").with_api_base(server.uri()));
        MessagingConnector::new(config).unwrap()
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(MessagingConnector::normalize_phone("+351 910-000-000").unwrap(), "351910000000");
        assert!(MessagingConnector::normalize_phone("12345").is_err());
        assert!(MessagingConnector::normalize_phone("+351 91O 000 000").is_err());
    }

    #[tokio::test]
    async fn test_whatsapp_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/10950/messages"))
            .and(header("authorization", "Bearer wa-token"))
            .and(body_partial_json(json!({
                "messaging_product": "whatsapp",
                "to": "351910000000",
                "text": {"body": "Your booking is confirmed"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "contacts": [{"input": "351910000000", "wa_id": "351910000000"}],
                "messages": [{"id": "wamid.HBgM"}]
            })))
            .mount(&server)
            .await;

        let receipt = connector_for(&server)
            .send(Notification::whatsapp("+351910000000", "Your booking is confirmed"))
            .await
            .unwrap();
        assert_eq!(receipt.channel, Channel::WhatsApp);
        assert_eq!(receipt.provider_message_id, "wamid.HBgM");
    }

    #[tokio::test]
    async fn test_whatsapp_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Recipient phone number not in allowed list", "code": 131030}
            })))
            .mount(&server)
            .await;

        let result = connector_for(&server)
            .send(Notification::whatsapp("+351910000000", "hi"))
            .await;
        match result {
            Err(NotifyError::ApiError(message)) => assert!(message.contains("not in allowed list")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_email_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_key"))
            .and(body_partial_json(json!({
                "to": ["ana@example.com"],
                "subject": "Claim update"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "em_123"})))
            .mount(&server)
            .await;

        let receipt = connector_for(&server)
            .send(Notification::email("ana@example.com", "Claim update", "Your claim was approved"))
            .await
            .unwrap();
        assert_eq!(receipt.provider_message_id, "em_123");
    }

    #[tokio::test]
    async fn test_unconfigured_channel() {
        let connector = MessagingConnector::new(MessagingConfig::new()).unwrap();
        let result = connector.send(Notification::email("ana@example.com", "s", "b")).await;
        assert!(matches!(result, Err(NotifyError::ChannelUnavailable(_))));
    }
}
