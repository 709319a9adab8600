//! Object storage backed by the hosted storage API

use crate::config::HostedConfig;
use reqwest::Client;
use std::time::Duration;
use tidyhub_core::prelude::*;
use tracing::{debug, info};

/// Bucket uploads through the hosted storage API
pub struct HostedStorage {
    client: Client,
    config: HostedConfig,
}

impl HostedStorage {
    pub fn new(config: HostedConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| StorageError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        info!("Hosted storage configured for bucket {}", config.storage_bucket);
        Ok(Self { client, config })
    }

    /// Public URL for an object in the configured bucket
    pub fn public_url(&self, path: &str) -> String {
        self.config
            .storage_url(&format!("object/public/{}/{}", self.config.storage_bucket, path))
    }
}

#[async_trait]
impl ObjectStorage for HostedStorage {
    async fn upload(&self, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<StoredObject, StorageError> {
        if bytes.len() > self.config.max_upload_bytes {
            return Err(StorageError::TooLarge(bytes.len()));
        }

        let size = bytes.len();
        debug!("Uploading {} bytes to {}", size, path);
        let response = self
            .client
            .post(self.config.storage_url(&format!("object/{}/{}", self.config.storage_bucket, path)))
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StorageError::UploadFailed(format!(
                "Storage API error {}: {}",
                status, error_text
            )));
        }

        Ok(StoredObject {
            path: path.to_string(),
            url: self.public_url(path),
            size,
        })
    }
}
