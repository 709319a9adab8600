//! HTTP client for the TidyHub API

use crate::config::TidyConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidyhub_core::errors::CoreError;
use tracing::{debug, error};

/// API client for a running TidyHub server
pub struct TidyClient {
    client: Client,
    config: TidyConfig,
}

impl TidyClient {
    /// Create a new API client
    pub fn new(config: TidyConfig) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .default_headers(auth_headers(&config)?)
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response, CoreError> {
        let url = self.config.api_url(path);
        debug!("GET {}", url);

        self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::Internal(format!("HTTP GET failed: {}", e)))
    }

    /// Make a POST request with JSON body
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, CoreError> {
        let url = self.config.api_url(path);
        debug!("POST {}", url);

        self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::Internal(format!("HTTP POST failed: {}", e)))
    }

    /// Make a PATCH request with JSON body
    pub async fn patch<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, CoreError> {
        let url = self.config.api_url(path);
        debug!("PATCH {}", url);

        self.client
            .patch(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::Internal(format!("HTTP PATCH failed: {}", e)))
    }

    /// Check the status and parse the whole JSON body
    pub async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, CoreError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| CoreError::Internal(format!("Failed to parse JSON response: {}", e)));
        }

        let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ApiErrorBody>(&error_text)
            .map(|body| body.error)
            .unwrap_or(error_text);

        error!("API error {}: {}", status, message);

        match status.as_u16() {
            400 => Err(CoreError::Validation(message)),
            401 => Err(CoreError::Unauthorized),
            403 => Err(CoreError::Forbidden(message)),
            404 => Err(CoreError::NotFound(message.trim_end_matches(" not found").to_string())),
            409 => Err(CoreError::Conflict(message)),
            _ => Err(CoreError::Internal(format!("HTTP error {}: {}", status, message))),
        }
    }

    /// Parse the value under `key` of a `{ key: value }` response
    pub async fn handle_field<T: DeserializeOwned>(&self, response: Response, key: &str) -> Result<T, CoreError> {
        let mut body: Value = self.handle_response(response).await?;
        let value = body
            .get_mut(key)
            .map(Value::take)
            .ok_or_else(|| CoreError::Internal(format!("Response is missing `{}`", key)))?;
        Ok(serde_json::from_value(value)?)
    }
}

fn auth_headers(config: &TidyConfig) -> Result<HeaderMap, CoreError> {
    let mut headers = HeaderMap::new();
    if let Some(ref token) = config.auth_token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| CoreError::Configuration(format!("Invalid auth token: {}", e)))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// Health check response
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
    pub timestamp: String,
}

/// Error envelope returned by the API
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = TidyConfig::default();
        assert!(TidyClient::new(config).is_ok());
    }

    #[test]
    fn test_auth_headers() {
        let config = TidyConfig {
            auth_token: Some("abc".to_string()),
            ..Default::default()
        };
        let headers = auth_headers(&config).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");

        let config = TidyConfig {
            auth_token: Some("bad\ntoken".to_string()),
            ..Default::default()
        };
        assert!(matches!(auth_headers(&config), Err(CoreError::Configuration(_))));
    }
}
