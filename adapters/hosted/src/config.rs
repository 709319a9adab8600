//! Configuration for the hosted backends

use serde::{Deserialize, Serialize};

/// Connection settings for the hosted database, auth and storage project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedConfig {
    /// Project base URL (e.g., https://abc.supabase.co)
    pub url: String,
    /// Public key, used for password logins and token checks
    pub anon_key: String,
    /// Service-role key, used for every server-side data call
    pub service_role_key: String,
    /// Bucket that receives claim photos
    pub storage_bucket: String,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl HostedConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_role_key: service_role_key.into(),
            ..Default::default()
        }
    }

    /// Set the claim photo bucket
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.storage_bucket = bucket.into();
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub(crate) fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.url, path)
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path)
    }

    pub(crate) fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.url, path)
    }
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            service_role_key: String::new(),
            storage_bucket: "claim-photos".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            timeout_ms: 10_000,
        }
    }
}

/// DNS-over-HTTPS resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DohConfig {
    /// JSON DoH endpoint (RFC 8484 JSON flavour)
    pub endpoint: String,
    pub timeout_ms: u64,
}

impl DohConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Default for DohConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://cloudflare-dns.com/dns-query".to_string(),
            timeout_ms: 5_000,
        }
    }
}
