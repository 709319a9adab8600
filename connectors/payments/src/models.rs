//! Payments API data models

use serde::Deserialize;
use tidyhub_core::prelude::ConnectedAccount;

/// Connected account object
#[derive(Debug, Deserialize)]
pub struct AccountObject {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
}

impl From<AccountObject> for ConnectedAccount {
    fn from(account: AccountObject) -> Self {
        ConnectedAccount {
            id: account.id,
            charges_enabled: account.charges_enabled,
            payouts_enabled: account.payouts_enabled,
            details_submitted: account.details_submitted,
        }
    }
}

/// Hosted onboarding link
#[derive(Debug, Deserialize)]
pub struct AccountLink {
    pub url: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// Error envelope
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
