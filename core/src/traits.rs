//! Core traits defining the seams to external managed services

use crate::errors::{AuthError, CoreError, NotifyError, PaymentsError, PresentationError, StorageError, StoreError};
use crate::services::Marketplace;
use crate::types::{Filter, PointsDelta, Record, RecordQuery, Role, Scope, Table, TenantId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Core trait for the hosted relational database.
///
/// Every call carries a [`Scope`]: tenant-scoped calls must never observe or
/// modify rows of another tenant.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new row
    async fn insert(&self, scope: &Scope, table: Table, record: Record) -> Result<Record, StoreError>;

    /// Get a row by primary key
    async fn get(&self, scope: &Scope, table: Table, id: Uuid) -> Result<Option<Record>, StoreError>;

    /// Select rows matching a query
    async fn select(&self, scope: &Scope, table: Table, query: RecordQuery) -> Result<Vec<Record>, StoreError>;

    /// Merge a JSON object into an existing row
    async fn update(&self, scope: &Scope, table: Table, id: Uuid, patch: serde_json::Value) -> Result<Option<Record>, StoreError>;

    /// Delete a row
    async fn delete(&self, scope: &Scope, table: Table, id: Uuid) -> Result<bool, StoreError>;

    /// Count rows matching filters
    async fn count(&self, scope: &Scope, table: Table, filters: Vec<Filter>) -> Result<u64, StoreError>;

    /// Apply a loyalty balance change and write its ledger entry as one unit.
    ///
    /// Returns the new balance. Fails with `InsufficientBalance` instead of
    /// going below zero.
    async fn apply_points(&self, tenant: &TenantId, delta: PointsDelta) -> Result<i64, StoreError>;

    /// Test the connection to the storage backend
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// User identity as reported by the hosted auth provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    /// Tenant the account belongs to; `None` only for platform staff
    pub tenant_id: Option<TenantId>,
}

/// Request to register a new account with the auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub tenant_id: TenantId,
    pub role: Role,
    pub full_name: String,
}

/// Authenticated session issued by the auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: Identity,
}

/// Trait for the hosted authentication service
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Register a new account
    async fn sign_up(&self, request: SignUpRequest) -> Result<Identity, AuthError>;

    /// Exchange email and password for a session
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Send a password-reset email
    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Validate an access token and return its identity
    async fn get_user(&self, access_token: &str) -> Result<Identity, AuthError>;

    /// Change the role recorded in the account's app metadata
    async fn update_role(&self, user_id: UserId, role: Role) -> Result<(), AuthError>;
}

/// An object written to hosted storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
    pub size: usize,
}

/// Trait for hosted object storage buckets
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<StoredObject, StorageError>;
}

/// Delivery channel for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    WhatsApp,
    Email,
}

/// An outbound notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub channel: Channel,
    /// Phone number in E.164 for WhatsApp, address for email
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
}

impl Notification {
    pub fn whatsapp(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel: Channel::WhatsApp,
            to: to.into(),
            subject: None,
            body: body.into(),
        }
    }

    pub fn email(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel: Channel::Email,
            to: to.into(),
            subject: Some(subject.into()),
            body: body.into(),
        }
    }
}

/// Provider acknowledgement of a sent notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub channel: Channel,
    pub provider_message_id: String,
    pub accepted_at: DateTime<Utc>,
}

/// Trait for messaging API connectors
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<DeliveryReceipt, NotifyError>;
}

/// Connected payout account on the payments platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub id: String,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
}

/// Trait for the payments-connect platform
#[async_trait]
pub trait PaymentsGateway: Send + Sync {
    /// Create a connected account for a provider
    async fn create_account(&self, email: &str) -> Result<ConnectedAccount, PaymentsError>;

    /// Create a hosted onboarding link for an account
    async fn onboarding_link(&self, account_id: &str) -> Result<String, PaymentsError>;

    /// Fetch the current status of an account
    async fn account_status(&self, account_id: &str) -> Result<ConnectedAccount, PaymentsError>;
}

/// Trait for DNS lookups used by custom-domain verification
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Return the CNAME targets for a host (empty when none)
    async fn resolve_cname(&self, host: &str) -> Result<Vec<String>, CoreError>;
}

/// Trait for presentation adapters (network transport layers)
#[async_trait]
pub trait PresentationAdapter: Send + Sync {
    /// Start serving requests against the marketplace services
    async fn start(&self, marketplace: Arc<Marketplace>) -> Result<(), PresentationError>;

    /// Stop the presentation adapter gracefully
    async fn stop(&self) -> Result<(), PresentationError>;
}

/// Trait for request processing pipeline plugins
#[async_trait]
pub trait PipelinePlugin: Send + Sync {
    /// A unique identifier for the plugin
    fn name(&self) -> &'static str;

    /// Called once when the plugin is loaded and initialized
    async fn init(&mut self, config: PluginConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Executes the plugin's logic
    async fn call(&self, ctx: &mut RequestContext) -> PluginOutcome;

    /// Optional: Called during graceful shutdown
    async fn teardown(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// Outcome of a plugin's execution
#[derive(Debug)]
pub enum PluginOutcome {
    /// Continue to the next plugin or stage
    Continue,
    /// Halt pipeline processing immediately
    Halt,
    /// Halt with an error
    HaltWithError(Box<dyn std::error::Error + Send + Sync>),
}

/// Configuration for a plugin instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    pub enabled: bool,
    pub config: serde_json::Value,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            config: serde_json::Value::Object(Default::default()),
        }
    }
}

/// Represents the shared context flowing through the pipeline
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub tenant_id: Option<TenantId>,
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    /// Response status, set once the handler has run
    pub status: Option<u16>,
    pub attributes: HashMap<String, serde_json::Value>,
    pub start_time: std::time::Instant,
    pub error: Option<String>,
}

impl RequestContext {
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tenant_id: None,
            method,
            path,
            headers: HashMap::new(),
            status: None,
            attributes: HashMap::new(),
            start_time: std::time::Instant::now(),
            error: None,
        }
    }

    /// Header lookup, case-insensitive on the name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn get_attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}
