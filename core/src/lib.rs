//! # TidyHub Core
//!
//! Core types, traits, and marketplace services for the TidyHub cleaning
//! services platform. Persistence, auth, storage, messaging and payments are
//! external managed services reached through the traits in [`traits`].

pub mod types;
pub mod traits;
pub mod errors;
pub mod tenant;
pub mod pipeline;
pub mod services;

// Re-export commonly used types and traits
pub use types::{Entity, Record, Role, Scope, Table, TenantId, UserId};
pub use traits::{
    AuthProvider, DnsResolver, Notifier, ObjectStorage, PaymentsGateway, PipelinePlugin, PluginConfig,
    PluginOutcome, PresentationAdapter, RecordStore, RequestContext,
};
pub use errors::{CoreError, CoreResult, StoreError};
pub use services::{Caller, Marketplace, MarketplaceSettings};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::types::*;
    pub use crate::traits::*;
    pub use crate::errors::*;
    pub use crate::services::{Caller, Marketplace, MarketplaceSettings};
    pub use async_trait::async_trait;
    pub use uuid::Uuid;
    pub use chrono::{DateTime, Utc};
}
