//! In-process stand-ins for the hosted auth, storage, messaging, payments and DNS services

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tidyhub_core::errors::{AuthError, NotifyError, PaymentsError, StorageError};
use tidyhub_core::prelude::*;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Shortest password the in-memory auth accepts
const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone)]
struct AuthAccount {
    identity: Identity,
    password: String,
}

#[derive(Debug, Default)]
struct AuthState {
    accounts: HashMap<String, AuthAccount>,
    tokens: HashMap<String, UserId>,
    reset_requests: Vec<String>,
}

impl AuthState {
    fn account_by_id(&self, id: UserId) -> Option<&AuthAccount> {
        self.accounts.values().find(|a| a.identity.id == id)
    }
}

/// Email/password auth kept in memory, issuing opaque bearer tokens
#[derive(Debug, Default)]
pub struct InMemoryAuth {
    state: RwLock<AuthState>,
}

impl InMemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account directly, bypassing signup rules (root admins, fixtures)
    pub async fn seed_user(&self, identity: Identity, password: &str) {
        let mut state = self.state.write().await;
        info!("Seeding {} account {}", identity.role, identity.email);
        state.accounts.insert(
            identity.email.to_lowercase(),
            AuthAccount {
                identity,
                password: password.to_string(),
            },
        );
    }

    /// Issue a token for an existing account without a password
    pub async fn issue_token(&self, user_id: UserId) -> Option<String> {
        let mut state = self.state.write().await;
        state.account_by_id(user_id)?;
        let token = format!("mem-{}", Uuid::new_v4().simple());
        state.tokens.insert(token.clone(), user_id);
        Some(token)
    }

    /// Addresses that asked for a password reset
    pub async fn reset_requests(&self) -> Vec<String> {
        self.state.read().await.reset_requests.clone()
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuth {
    async fn sign_up(&self, request: SignUpRequest) -> Result<Identity, AuthError> {
        let mut state = self.state.write().await;
        let email = request.email.to_lowercase();
        if state.accounts.contains_key(&email) {
            return Err(AuthError::UserExists);
        }
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.clone(),
            role: request.role,
            tenant_id: Some(request.tenant_id),
        };
        state.accounts.insert(
            email,
            AuthAccount {
                identity: identity.clone(),
                password: request.password,
            },
        );
        debug!("Registered in-memory account {}", identity.id);
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut state = self.state.write().await;
        let identity = match state.accounts.get(&email.to_lowercase()) {
            Some(account) if account.password == password => account.identity.clone(),
            _ => return Err(AuthError::InvalidCredentials),
        };

        let access_token = format!("mem-{}", Uuid::new_v4().simple());
        state.tokens.insert(access_token.clone(), identity.id);
        Ok(Session {
            access_token,
            refresh_token: format!("mem-refresh-{}", Uuid::new_v4().simple()),
            expires_in: 3600,
            user: identity,
        })
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let mut state = self.state.write().await;
        state.reset_requests.push(email.to_lowercase());
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let state = self.state.read().await;
        let user_id = state.tokens.get(access_token).ok_or(AuthError::InvalidToken)?;
        state
            .account_by_id(*user_id)
            .map(|a| a.identity.clone())
            .ok_or(AuthError::InvalidToken)
    }

    async fn update_role(&self, user_id: UserId, role: Role) -> Result<(), AuthError> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .values_mut()
            .find(|a| a.identity.id == user_id)
            .ok_or_else(|| AuthError::ApiError(format!("User {} not found", user_id)))?;
        account.identity.role = role;
        Ok(())
    }
}

/// Bucket storage kept in memory
#[derive(Debug)]
pub struct InMemoryStorage {
    base_url: String,
    max_bytes: usize,
    objects: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl InMemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_bytes: 10 * 1024 * 1024,
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Content type and bytes of a stored object
    pub async fn object(&self, path: &str) -> Option<(String, Vec<u8>)> {
        self.objects.read().await.get(path).cloned()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn upload(&self, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<StoredObject, StorageError> {
        if bytes.len() > self.max_bytes {
            return Err(StorageError::TooLarge(bytes.len()));
        }
        let size = bytes.len();
        self.objects
            .write()
            .await
            .insert(path.to_string(), (content_type.to_string(), bytes));
        Ok(StoredObject {
            path: path.to_string(),
            url: format!("{}/{}", self.base_url.trim_end_matches('/'), path),
            size,
        })
    }
}

/// Notifier that records every message instead of sending it
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<Notification>>,
    unavailable: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every send fails, for exercising best-effort paths
    pub fn unavailable() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            unavailable: true,
        }
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<DeliveryReceipt, NotifyError> {
        if self.unavailable {
            return Err(NotifyError::ChannelUnavailable(format!("{:?}", notification.channel)));
        }
        if notification.to.trim().is_empty() {
            return Err(NotifyError::InvalidRecipient("empty recipient".to_string()));
        }
        let receipt = DeliveryReceipt {
            channel: notification.channel,
            provider_message_id: format!("mem-msg-{}", Uuid::new_v4().simple()),
            accepted_at: Utc::now(),
        };
        self.sent.write().await.push(notification);
        Ok(receipt)
    }
}

/// Connected accounts kept in memory
#[derive(Debug, Default)]
pub struct InMemoryPayments {
    accounts: RwLock<HashMap<String, ConnectedAccount>>,
}

impl InMemoryPayments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an account as fully onboarded
    pub async fn complete_onboarding(&self, account_id: &str) -> bool {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(account_id) {
            Some(account) => {
                account.charges_enabled = true;
                account.payouts_enabled = true;
                account.details_submitted = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PaymentsGateway for InMemoryPayments {
    async fn create_account(&self, email: &str) -> Result<ConnectedAccount, PaymentsError> {
        let id = format!("acct_{}", &Uuid::new_v4().simple().to_string()[..16]);
        let account = ConnectedAccount {
            id: id.clone(),
            charges_enabled: false,
            payouts_enabled: false,
            details_submitted: false,
        };
        self.accounts.write().await.insert(id, account.clone());
        debug!("Created in-memory connected account {} for {}", account.id, email);
        Ok(account)
    }

    async fn onboarding_link(&self, account_id: &str) -> Result<String, PaymentsError> {
        if !self.accounts.read().await.contains_key(account_id) {
            return Err(PaymentsError::AccountNotFound(account_id.to_string()));
        }
        Ok(format!("https://connect.invalid/onboarding/{}", account_id))
    }

    async fn account_status(&self, account_id: &str) -> Result<ConnectedAccount, PaymentsError> {
        self.accounts
            .read()
            .await
            .get(account_id)
            .cloned()
            .ok_or_else(|| PaymentsError::AccountNotFound(account_id.to_string()))
    }
}

/// DNS answers from a fixed table
#[derive(Debug, Default, Clone)]
pub struct StaticDnsResolver {
    cnames: HashMap<String, Vec<String>>,
}

impl StaticDnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cname(mut self, host: &str, target: &str) -> Self {
        self.cnames
            .entry(normalize_host(host))
            .or_default()
            .push(target.to_string());
        self
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_lowercase()
}

#[async_trait]
impl DnsResolver for StaticDnsResolver {
    async fn resolve_cname(&self, host: &str) -> Result<Vec<String>, CoreError> {
        Ok(self.cnames.get(&normalize_host(host)).cloned().unwrap_or_default())
    }
}
