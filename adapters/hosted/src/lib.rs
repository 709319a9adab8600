//! Hosted backends for TidyHub: Postgres REST gateway, GoTrue auth, bucket
//! storage and DNS-over-HTTPS.

mod auth;
mod config;
mod dns;
mod queries;
mod storage;
mod store;
mod utils;

pub use auth::HostedAuth;
pub use config::{DohConfig, HostedConfig};
pub use dns::DohResolver;
pub use storage::HostedStorage;
pub use store::HostedStore;

use tidyhub_core::prelude::CoreError;

/// Clients for every hosted-project service, built from one configuration
pub struct HostedBackends {
    pub store: HostedStore,
    pub auth: HostedAuth,
    pub storage: HostedStorage,
    pub dns: DohResolver,
}

impl HostedBackends {
    pub fn connect(config: HostedConfig, doh: DohConfig) -> Result<Self, CoreError> {
        Ok(Self {
            store: HostedStore::new(config.clone())?,
            auth: HostedAuth::new(config.clone())?,
            storage: HostedStorage::new(config)?,
            dns: DohResolver::new(doh)?,
        })
    }
}
