//! Payments-connect connector for TidyHub provider payouts

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tidyhub_core::prelude::*;
use tracing::{debug, info, warn};

mod config;
mod models;

pub use config::PaymentsConfig;
use models::*;

/// Connected-account gateway speaking the form-encoded payments API
pub struct PaymentsConnector {
    client: Client,
    config: PaymentsConfig,
}

impl PaymentsConnector {
    /// Create a new payments connector
    pub fn new(config: PaymentsConfig) -> Result<Self, PaymentsError> {
        if config.secret_key.is_empty() {
            return Err(PaymentsError::ConfigError("Payments secret key is not set".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PaymentsError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn check(response: Response, account_id: Option<&str>) -> Result<Response, PaymentsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ApiErrorResponse>(&error_text).ok().map(|e| e.error);
        let missing = status == StatusCode::NOT_FOUND
            || body.as_ref().and_then(|b| b.code.as_deref()) == Some("resource_missing");
        if let (true, Some(id)) = (missing, account_id) {
            return Err(PaymentsError::AccountNotFound(id.to_string()));
        }

        let message = body.and_then(|b| b.message).unwrap_or(error_text);
        warn!("Payments API error {}: {}", status, message);
        Err(PaymentsError::ApiError(format!("Payments API error {}: {}", status, message)))
    }

    async fn account(response: Response) -> Result<ConnectedAccount, PaymentsError> {
        let account: AccountObject = response
            .json()
            .await
            .map_err(|e| PaymentsError::ResponseParseError(format!("Failed to parse account: {}", e)))?;
        Ok(account.into())
    }

    fn network(e: reqwest::Error) -> PaymentsError {
        PaymentsError::NetworkError(format!("HTTP request failed: {}", e))
    }
}

#[async_trait]
impl PaymentsGateway for PaymentsConnector {
    async fn create_account(&self, email: &str) -> Result<ConnectedAccount, PaymentsError> {
        let form = [
            ("type", self.config.account_type.as_str()),
            ("email", email),
            ("capabilities[transfers][requested]", "true"),
            ("business_type", "individual"),
        ];
        let response = self
            .client
            .post(format!("{}/accounts", self.config.api_base))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(Self::network)?;

        let account = Self::account(Self::check(response, None).await?).await?;
        info!("Created connected account {}", account.id);
        Ok(account)
    }

    async fn onboarding_link(&self, account_id: &str) -> Result<String, PaymentsError> {
        let form = [
            ("account", account_id),
            ("refresh_url", self.config.refresh_url.as_str()),
            ("return_url", self.config.return_url.as_str()),
            ("type", "account_onboarding"),
        ];
        let response = self
            .client
            .post(format!("{}/account_links", self.config.api_base))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(Self::network)?;

        let link: AccountLink = Self::check(response, Some(account_id))
            .await?
            .json()
            .await
            .map_err(|e| PaymentsError::ResponseParseError(format!("Failed to parse account link: {}", e)))?;
        debug!("Onboarding link for {} expires at {:?}", account_id, link.expires_at);
        Ok(link.url)
    }

    async fn account_status(&self, account_id: &str) -> Result<ConnectedAccount, PaymentsError> {
        let response = self
            .client
            .get(format!("{}/accounts/{}", self.config.api_base, account_id))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(Self::network)?;

        Self::account(Self::check(response, Some(account_id)).await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connector_for(server: &MockServer) -> PaymentsConnector {
        PaymentsConnector::new(
            PaymentsConfig::new("sk_test_123")
                .with_api_base(server.uri())
                .with_redirects("https://app.example/refresh", "https://app.example/done"),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_secret_key() {
        assert!(matches!(
            PaymentsConnector::new(PaymentsConfig::default()),
            Err(PaymentsError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_account_and_link() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("email=pat%40example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "acct_1Nv0FGQ9RKHgCVdK",
                "object": "account",
                "charges_enabled": false,
                "payouts_enabled": false,
                "details_submitted": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/account_links"))
            .and(body_string_contains("type=account_onboarding"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "account_link",
                "url": "https://connect.example/setup/e/acct_1Nv0FGQ9RKHgCVdK",
                "expires_at": 1700000000
            })))
            .mount(&server)
            .await;

        let connector = connector_for(&server);
        let account = connector.create_account("pat@example.com").await.unwrap();
        assert_eq!(account.id, "acct_1Nv0FGQ9RKHgCVdK");
        assert!(!account.payouts_enabled);

        let url = connector.onboarding_link(&account.id).await.unwrap();
        assert!(url.ends_with("acct_1Nv0FGQ9RKHgCVdK"));
    }

    #[tokio::test]
    async fn test_account_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acct_ready"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "acct_ready",
                "charges_enabled": true,
                "payouts_enabled": true,
                "details_submitted": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/accounts/acct_gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": "resource_missing",
                    "message": "No such account: 'acct_gone'",
                    "type": "invalid_request_error"
                }
            })))
            .mount(&server)
            .await;

        let connector = connector_for(&server);
        let status = connector.account_status("acct_ready").await.unwrap();
        assert!(status.payouts_enabled && status.details_submitted);

        assert!(matches!(
            connector.account_status("acct_gone").await,
            Err(PaymentsError::AccountNotFound(id)) if id == "acct_gone"
        ));
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Connect is not enabled", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        match connector_for(&server).create_account("pat@example.com").await {
            Err(PaymentsError::ApiError(message)) => assert!(message.contains("Connect is not enabled")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
