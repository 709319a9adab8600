//! Signup, login and user administration

use super::loyalty::holds_loyalty_account;
use super::{page_limit, required_str, Caller, Marketplace};
use crate::errors::{AuthError, CoreError, CoreResult};
use crate::traits::{Identity, Notification, Session, SignUpRequest};
use crate::types::{Entity, Order, RecordQuery, Role, Scope, Table, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Shortest accepted password
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Application-side profile of an authenticated account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub referral_code: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for UserProfile {
    const TABLE: Table = Table::Users;

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

/// Signup form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub referral_code: Option<String>,
}

/// Minimal address check; the auth provider does the real validation
pub fn validate_email(email: &str) -> CoreResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    };
    if valid && !email.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(CoreError::validation(format!("Invalid email: {}", email)))
    }
}

impl Marketplace {
    /// Register a customer or provider in a tenant
    pub async fn signup(&self, tenant: TenantId, input: SignupInput) -> CoreResult<UserProfile> {
        let email = required_str(input.email, "email")?.to_lowercase();
        let password = input.password.filter(|p| !p.is_empty()).ok_or(CoreError::MissingField("password"))?;
        let full_name = required_str(input.full_name, "full_name")?;
        validate_email(&email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(CoreError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let role = match input.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => raw.parse::<Role>()?,
            None => Role::Customer,
        };
        if !matches!(role, Role::Customer | Role::Provider) {
            return Err(CoreError::validation(format!("Role not allowed at signup: {}", role)));
        }

        self.ensure_tenant_active(tenant).await?;

        let identity = self
            .auth
            .sign_up(SignUpRequest {
                email: email.clone(),
                password,
                tenant_id: tenant,
                role,
                full_name: full_name.clone(),
            })
            .await
            .map_err(|e| match e {
                AuthError::UserExists => CoreError::Conflict("User already exists".to_string()),
                AuthError::WeakPassword(msg) => CoreError::Validation(msg),
                other => CoreError::Auth(other),
            })?;

        let referral_code = self.unique_referral_code(tenant, identity.id).await?;
        let profile = UserProfile {
            id: identity.id,
            tenant_id: tenant,
            email: email.clone(),
            full_name,
            role,
            phone: input.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            referral_code,
            created_at: Utc::now(),
        };
        let scope = Scope::Tenant(tenant);
        let profile = self.insert_entity(&scope, &profile).await?;

        if holds_loyalty_account(role) {
            self.ensure_loyalty_account(tenant, profile.id).await?;
        }

        if let Some(code) = input.referral_code.filter(|c| !c.trim().is_empty()) {
            let caller = Caller::new(profile.id, role, tenant);
            match self.apply_referral_code(&caller, &code).await {
                Ok(referral) => info!("User {} referred by {}", profile.id, referral.referrer_id),
                Err(CoreError::NotFound(_)) => warn!("Unknown referral code {} at signup", code),
                Err(e) => warn!("Could not apply referral code {}: {}", code, e),
            }
        }

        self.notify_best_effort(Notification::email(
            &email,
            "Welcome to TidyHub",
            format!("Hi {}, your account is ready.", profile.full_name),
        ))
        .await;

        info!("Signed up {} as {} in tenant {}", profile.id, role, tenant);
        Ok(profile)
    }

    /// Password login. The account must belong to the resolved tenant.
    pub async fn login(&self, tenant: TenantId, email: Option<String>, password: Option<String>) -> CoreResult<Session> {
        let email = required_str(email, "email")?.to_lowercase();
        let password = password.filter(|p| !p.is_empty()).ok_or(CoreError::MissingField("password"))?;

        let session = self.auth.sign_in(&email, &password).await.map_err(|e| match e {
            AuthError::InvalidCredentials => CoreError::Unauthorized,
            other => CoreError::Auth(other),
        })?;

        if !session.user.role.is_root() && session.user.tenant_id != Some(tenant) {
            warn!("Login for {} rejected: account belongs to another tenant", session.user.id);
            return Err(CoreError::Unauthorized);
        }
        Ok(session)
    }

    /// Send a reset email. Unknown addresses look the same as known ones.
    pub async fn request_password_reset(&self, email: Option<String>) -> CoreResult<()> {
        let email = required_str(email, "email")?.to_lowercase();
        validate_email(&email)?;
        if let Err(e) = self.auth.send_password_reset(&email).await {
            warn!("Password reset for {} failed: {}", email, e);
        }
        Ok(())
    }

    /// Validate a bearer token
    pub async fn authenticate(&self, access_token: &str) -> CoreResult<Identity> {
        self.auth.get_user(access_token).await.map_err(|e| match e {
            AuthError::NetworkError(_) | AuthError::ApiError(_) => CoreError::Auth(e),
            _ => CoreError::Unauthorized,
        })
    }

    /// Profile of the calling user
    pub async fn session(&self, caller: &Caller) -> CoreResult<UserProfile> {
        self.get_user(&caller.scope(), caller.user_id).await
    }

    /// Users visible to an admin, optionally filtered by role
    pub async fn list_users(
        &self,
        caller: &Caller,
        role: Option<&str>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> CoreResult<Vec<UserProfile>> {
        caller.require_admin()?;
        let mut query = RecordQuery::new()
            .order_by("created_at", Order::Desc)
            .limit(page_limit(limit))
            .offset(offset.unwrap_or(0));
        if let Some(role) = role.filter(|r| !r.is_empty()) {
            query = query.eq("role", role.parse::<Role>()?);
        }
        self.select_entities(&caller.scope(), query).await
    }

    /// Change a user's role. Only root admins can hand out admin roles.
    pub async fn set_user_role(&self, caller: &Caller, user_id: UserId, role: Option<String>) -> CoreResult<UserProfile> {
        caller.require_admin()?;
        let role: Role = required_str(role, "role")?.parse()?;
        if role.is_admin() && !caller.role.is_root() {
            return Err(CoreError::forbidden("Only root admins can grant admin roles"));
        }

        let scope = caller.scope();
        let user = self.get_user(&scope, user_id).await?;
        if user.role.is_root() && !caller.role.is_root() {
            return Err(CoreError::forbidden("Cannot change a root admin"));
        }

        self.auth.update_role(user_id, role).await?;
        let updated = self
            .update_entity::<UserProfile>(&scope, user_id, serde_json::json!({"role": role}))
            .await?
            .ok_or_else(|| CoreError::not_found("User"))?;
        info!("User {} role changed from {} to {} by {}", user_id, user.role, role, caller.user_id);
        Ok(updated)
    }

    pub(crate) async fn get_user(&self, scope: &Scope, user_id: UserId) -> CoreResult<UserProfile> {
        self.get_entity::<UserProfile>(scope, user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("User"))
    }

    pub(crate) async fn find_user_by_referral_code(&self, scope: &Scope, code: &str) -> CoreResult<Option<UserProfile>> {
        self.first_entity(scope, RecordQuery::new().eq("referral_code", code)).await
    }
}
