//! In-memory implementations of the TidyHub service traits, for testing and development

mod services;
mod store;

#[cfg(test)]
mod tests;

pub use services::{InMemoryAuth, InMemoryPayments, InMemoryStorage, RecordingNotifier, StaticDnsResolver};
pub use store::{InMemoryConfig, InMemoryStore};

use std::sync::Arc;
use tidyhub_core::Marketplace;

/// Handles to every in-memory backend, kept so tests can inspect them
#[derive(Clone)]
pub struct InMemoryBackends {
    pub store: Arc<InMemoryStore>,
    pub auth: Arc<InMemoryAuth>,
    pub storage: Arc<InMemoryStorage>,
    pub notifier: Arc<RecordingNotifier>,
    pub payments: Arc<InMemoryPayments>,
    pub dns: Arc<StaticDnsResolver>,
}

impl InMemoryBackends {
    pub fn new() -> Self {
        Self::with_dns(StaticDnsResolver::new())
    }

    /// Use a preconfigured DNS resolver
    pub fn with_dns(dns: StaticDnsResolver) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            auth: Arc::new(InMemoryAuth::new()),
            storage: Arc::new(InMemoryStorage::new("memory://claims")),
            notifier: Arc::new(RecordingNotifier::new()),
            payments: Arc::new(InMemoryPayments::new()),
            dns: Arc::new(dns),
        }
    }

    /// Build a marketplace wired to these backends
    pub fn marketplace(&self) -> Marketplace {
        Marketplace::new(
            self.store.clone(),
            self.auth.clone(),
            self.storage.clone(),
            self.notifier.clone(),
            self.payments.clone(),
            self.dns.clone(),
        )
    }
}

impl Default for InMemoryBackends {
    fn default() -> Self {
        Self::new()
    }
}
