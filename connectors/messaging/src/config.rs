//! Configuration for the messaging connector

use serde::{Deserialize, Serialize};

/// WhatsApp Cloud API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Sender phone number id registered with the business account
    pub phone_number_id: String,
    /// Long-lived access token
    pub access_token: String,
    /// Graph API base URL, including version
    pub api_base: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl WhatsAppConfig {
    pub fn new(phone_number_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
            api_base: "https://graph.facebook.com/v19.0".to_string(),
            timeout_ms: 15_000,
        }
    }

    /// Set the API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Transactional email API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub api_key: String,
    /// Sender address, e.g. "TidyHub <no-reply@tidyhub.app>"
    pub from: String,
    pub api_base: String,
    pub timeout_ms: u64,
}

impl EmailConfig {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from: from.into(),
            api_base: "https://api.resend.com".to_string(),
            timeout_ms: 15_000,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Channels the connector can deliver on. A channel left unset is unavailable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagingConfig {
    pub whatsapp: Option<WhatsAppConfig>,
    pub email: Option<EmailConfig>,
}

impl MessagingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable WhatsApp delivery
    pub fn with_whatsapp(mut self, whatsapp: WhatsAppConfig) -> Self {
        self.whatsapp = Some(whatsapp);
        self
    }

    /// Enable email delivery
    pub fn with_email(mut self, email: EmailConfig) -> Self {
        self.email = Some(email);
        self
    }
}
