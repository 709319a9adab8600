//! Auth provider backed by the hosted GoTrue service

use crate::config::HostedConfig;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tidyhub_core::prelude::*;
use tracing::{debug, info};

/// Account as returned by GoTrue
#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    app_metadata: AppMetadata,
}

/// Server-controlled metadata; only the service role can write it
#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    tenant_id: Option<TenantId>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    user: GoTrueUser,
}

#[derive(Debug, Default, Deserialize)]
struct GoTrueError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl From<GoTrueUser> for Identity {
    fn from(user: GoTrueUser) -> Self {
        Identity {
            id: user.id,
            email: user.email.unwrap_or_default(),
            role: user.app_metadata.role.unwrap_or(Role::Customer),
            tenant_id: user.app_metadata.tenant_id,
        }
    }
}

/// GoTrue-backed implementation of [`AuthProvider`].
///
/// Role and tenant live in `app_metadata`, which end users cannot edit.
pub struct HostedAuth {
    client: Client,
    config: HostedConfig,
}

impl HostedAuth {
    pub fn new(config: HostedConfig) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AuthError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        info!("Hosted auth configured for {}", config.url);
        Ok(Self { client, config })
    }

    async fn check(response: Response) -> Result<Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let error: GoTrueError = serde_json::from_str(&text).unwrap_or_default();
        let message = error
            .msg
            .or(error.error_description)
            .unwrap_or_else(|| text.clone());

        let code = error.error_code.or(error.error);
        Err(match (status, code.as_deref()) {
            (_, Some("email_exists")) | (_, Some("user_already_exists")) => AuthError::UserExists,
            (_, Some("weak_password")) => AuthError::WeakPassword(message),
            (_, Some("invalid_credentials")) | (_, Some("invalid_grant")) => AuthError::InvalidCredentials,
            (_, Some("bad_jwt")) | (StatusCode::UNAUTHORIZED, _) | (StatusCode::FORBIDDEN, _) => AuthError::InvalidToken,
            (StatusCode::UNPROCESSABLE_ENTITY, _) if message.contains("already been registered") => AuthError::UserExists,
            _ => AuthError::ApiError(format!("Auth API error {}: {}", status, message)),
        })
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, AuthError> {
        response
            .json()
            .await
            .map_err(|e| AuthError::ApiError(format!("Failed to parse auth response: {}", e)))
    }

    fn network(e: reqwest::Error) -> AuthError {
        AuthError::NetworkError(format!("HTTP request failed: {}", e))
    }
}

#[async_trait]
impl AuthProvider for HostedAuth {
    async fn sign_up(&self, request: SignUpRequest) -> Result<Identity, AuthError> {
        debug!("Creating auth account for tenant {}", request.tenant_id);
        let body = json!({
            "email": request.email,
            "password": request.password,
            "email_confirm": true,
            "app_metadata": {
                "role": request.role,
                "tenant_id": request.tenant_id,
            },
            "user_metadata": { "full_name": request.full_name },
        });

        let response = self
            .client
            .post(self.config.auth_url("admin/users"))
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::network)?;
        let user: GoTrueUser = Self::parse(Self::check(response).await?).await?;
        Ok(user.into())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(Self::network)?;

        let token: TokenResponse = Self::parse(Self::check(response).await?).await?;
        Ok(Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            user: token.user.into(),
        })
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.config.auth_url("recover"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(Self::network)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let response = self
            .client
            .get(self.config.auth_url("user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(Self::network)?;

        let user: GoTrueUser = Self::parse(Self::check(response).await?).await?;
        Ok(user.into())
    }

    async fn update_role(&self, user_id: UserId, role: Role) -> Result<(), AuthError> {
        let response = self
            .client
            .put(self.config.auth_url(&format!("admin/users/{}", user_id)))
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
            .json(&json!({ "app_metadata": { "role": role } }))
            .send()
            .await
            .map_err(Self::network)?;
        Self::check(response).await?;
        Ok(())
    }
}
