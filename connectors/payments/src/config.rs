//! Configuration for the payments-connect connector

use serde::{Deserialize, Serialize};

/// Payments platform API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Platform secret key
    pub secret_key: String,
    /// API base URL
    pub api_base: String,
    /// Where the onboarding flow sends providers whose link expired
    pub refresh_url: String,
    /// Where the onboarding flow sends providers when they finish
    pub return_url: String,
    /// Connected account type to create
    pub account_type: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl PaymentsConfig {
    /// Create a new config with the given secret key
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: "https://api.stripe.com/v1".to_string(),
            refresh_url: "http://localhost:3000/provider/payouts?refresh=1".to_string(),
            return_url: "http://localhost:3000/provider/payouts?done=1".to_string(),
            account_type: "express".to_string(),
            timeout_ms: 20_000,
        }
    }

    /// Set the API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set both onboarding redirect URLs
    pub fn with_redirects(mut self, refresh_url: impl Into<String>, return_url: impl Into<String>) -> Self {
        self.refresh_url = refresh_url.into();
        self.return_url = return_url.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self::new("")
    }
}
