//! Messaging API data models

use serde::{Deserialize, Serialize};

/// WhatsApp Cloud send-message request
#[derive(Debug, Serialize)]
pub struct WhatsAppRequest {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub text: WhatsAppText,
}

/// Text payload of a WhatsApp message
#[derive(Debug, Serialize)]
pub struct WhatsAppText {
    pub preview_url: bool,
    pub body: String,
}

impl WhatsAppRequest {
    pub fn text(to: String, body: String) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            message_type: "text",
            text: WhatsAppText {
                preview_url: false,
                body,
            },
        }
    }
}

/// WhatsApp Cloud send-message response
#[derive(Debug, Deserialize)]
pub struct WhatsAppResponse {
    #[serde(default)]
    pub messages: Vec<WhatsAppMessageId>,
}

#[derive(Debug, Deserialize)]
pub struct WhatsAppMessageId {
    pub id: String,
}

/// Error envelope returned by the Graph API
#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphError,
}

#[derive(Debug, Deserialize)]
pub struct GraphError {
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}

/// Transactional email request
#[derive(Debug, Serialize)]
pub struct EmailRequest {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

/// Transactional email response
#[derive(Debug, Deserialize)]
pub struct EmailResponse {
    pub id: String,
}
