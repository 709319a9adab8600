//! CNAME lookups over DNS-over-HTTPS (JSON API)

use crate::config::DohConfig;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tidyhub_core::prelude::*;
use tracing::debug;

/// DNS record type number for CNAME
const CNAME_TYPE: u16 = 5;

/// DNS response code for a name that does not exist
const NXDOMAIN: u32 = 3;

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// [`DnsResolver`] that asks a public DoH endpoint
pub struct DohResolver {
    client: Client,
    config: DohConfig,
}

impl DohResolver {
    pub fn new(config: DohConfig) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| CoreError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl DnsResolver for DohResolver {
    async fn resolve_cname(&self, host: &str) -> Result<Vec<String>, CoreError> {
        debug!("Resolving CNAME for {}", host);
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("name", host), ("type", "CNAME")])
            .header("accept", "application/dns-json")
            .send()
            .await
            .map_err(|e| CoreError::Dns(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Dns(format!("Resolver returned {}", status)));
        }

        let body: DohResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Dns(format!("Failed to parse resolver response: {}", e)))?;
        match body.status {
            0 => Ok(body
                .answer
                .into_iter()
                .filter(|a| a.record_type == CNAME_TYPE)
                .map(|a| a.data)
                .collect()),
            NXDOMAIN => Ok(Vec::new()),
            code => Err(CoreError::Dns(format!("Resolver answered with rcode {}", code))),
        }
    }
}
