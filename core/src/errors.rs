//! Error types for TidyHub core operations

use thiserror::Error;

/// Main error type for TidyHub core operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Tenant(String),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Auth provider error: {0}")]
    Auth(#[from] AuthError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Payments error: {0}")]
    Payments(#[from] PaymentsError),

    #[error("Object storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        CoreError::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }
}

/// Errors related to the hosted record store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: i64, required: i64 },

    #[error("Tenant isolation violation: {0}")]
    TenantIsolationViolation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Errors from the hosted auth provider
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("User already registered")]
    UserExists,

    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error from auth provider: {0}")]
    ApiError(String),
}

/// Errors from messaging connectors (WhatsApp, email)
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error from messaging provider: {0}")]
    ApiError(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Channel not configured: {0}")]
    ChannelUnavailable(String),
}

/// Errors from the payments-connect platform
#[derive(Error, Debug)]
pub enum PaymentsError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error from payments provider: {0}")]
    ApiError(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Failed to parse payments response: {0}")]
    ResponseParseError(String),
}

/// Errors from hosted object storage
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Object too large: {0} bytes")]
    TooLarge(usize),
}

/// Errors related to presentation adapters
#[derive(Error, Debug)]
pub enum PresentationError {
    #[error("Server startup failed: {0}")]
    StartupFailed(String),

    #[error("Server shutdown failed: {0}")]
    ShutdownFailed(String),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
