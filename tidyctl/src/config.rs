//! Configuration management for tidyctl

use crate::cli::{Backend, Cli, OutputFormat};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tidyhub_adapter_hosted::{DohConfig, HostedConfig};
use tidyhub_connector_messaging::{EmailConfig, MessagingConfig, WhatsAppConfig};
use tidyhub_connector_payments::PaymentsConfig;
use tidyhub_core::errors::CoreError;
use tidyhub_core::MarketplaceSettings;
use tidyhub_http::HttpServerConfig;

const DEFAULT_CONFIG_PATHS: [&str; 3] = ["tidyhub.yaml", "tidyhub.yml", ".tidyhub.yaml"];

/// Configuration for tidyctl, for both the server and the client commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TidyConfig {
    /// TidyHub API endpoint used by client commands
    pub endpoint: String,
    /// Bearer token for root admin API calls
    pub auth_token: Option<String>,
    /// Default output format
    pub default_format: OutputFormat,
    /// Client request timeout in seconds
    pub timeout: u64,
    pub server: ServerSettings,
    pub backend: Backend,
    pub hosted: HostedSettings,
    pub messaging: MessagingSettings,
    pub payments: PaymentsSettings,
    pub dns: DnsSettings,
    pub platform: PlatformSettings,
}

impl Default for TidyConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000".to_string(),
            auth_token: None,
            default_format: OutputFormat::Table,
            timeout: 30,
            server: ServerSettings::default(),
            backend: Backend::InMemory,
            hosted: HostedSettings::default(),
            messaging: MessagingSettings::default(),
            payments: PaymentsSettings::default(),
            dns: DnsSettings::default(),
            platform: PlatformSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: SocketAddr,
    pub enable_cors: bool,
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let http = HttpServerConfig::default();
        Self {
            bind_address: http.bind_address,
            enable_cors: http.enable_cors,
            request_timeout_secs: http.request_timeout,
        }
    }
}

/// Hosted project credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostedSettings {
    pub url: String,
    pub anon_key: String,
    pub service_role_key: String,
    pub storage_bucket: String,
    pub timeout_ms: u64,
}

impl Default for HostedSettings {
    fn default() -> Self {
        let defaults = HostedConfig::new("", "", "");
        Self {
            url: String::new(),
            anon_key: String::new(),
            service_role_key: String::new(),
            storage_bucket: defaults.storage_bucket,
            timeout_ms: defaults.timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingSettings {
    pub whatsapp: WhatsAppSettings,
    pub email: EmailSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppSettings {
    pub phone_number_id: String,
    pub access_token: String,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub api_key: String,
    pub from: String,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsSettings {
    pub secret_key: String,
    pub api_base: Option<String>,
    pub refresh_url: Option<String>,
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsSettings {
    pub doh_endpoint: String,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            doh_endpoint: DohConfig::default().endpoint,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    /// Suffix of the CNAME target custom domains must point at
    pub cname_target: String,
    /// Public URL of the web app, used in onboarding links
    pub public_url: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        let settings = MarketplaceSettings::default();
        Self {
            cname_target: settings.cname_target,
            public_url: settings.public_url,
        }
    }
}

impl TidyConfig {
    /// Load configuration from defaults, files and environment
    pub fn load(config_path: &Option<PathBuf>) -> Result<Self, CoreError> {
        Self::figment(config_path)?
            .extract()
            .map_err(|e| CoreError::Configuration(format!("Failed to parse configuration: {}", e)))
    }

    fn figment(config_path: &Option<PathBuf>) -> Result<Figment, CoreError> {
        let mut figment = Figment::from(Serialized::defaults(TidyConfig::default()));

        if let Some(path) = DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            figment = figment.merge(Yaml::file(path));
        }

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(CoreError::Configuration(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }

        // TIDYHUB_HOSTED__URL sets hosted.url
        Ok(figment.merge(Env::prefixed("TIDYHUB_").split("__")))
    }

    /// Apply CLI argument overrides to the configuration
    pub fn with_overrides(mut self, args: &Cli) -> Self {
        if let Some(ref endpoint) = args.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(ref token) = args.token {
            self.auth_token = Some(token.clone());
        }
        if let Some(format) = args.format {
            self.default_format = format;
        }
        self
    }

    /// URL of an API path on the configured endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    pub fn http_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            bind_address: self.server.bind_address,
            enable_cors: self.server.enable_cors,
            request_timeout: self.server.request_timeout_secs,
        }
    }

    pub fn marketplace_settings(&self) -> MarketplaceSettings {
        MarketplaceSettings {
            cname_target: self.platform.cname_target.clone(),
            public_url: self.platform.public_url.clone(),
        }
    }

    /// Hosted project config; the URL and both keys are required
    pub fn hosted_config(&self) -> Result<HostedConfig, CoreError> {
        let hosted = &self.hosted;
        for (value, name) in [
            (&hosted.url, "hosted.url"),
            (&hosted.anon_key, "hosted.anon_key"),
            (&hosted.service_role_key, "hosted.service_role_key"),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Configuration(format!("{} is required for the hosted backend", name)));
            }
        }
        Ok(HostedConfig::new(&hosted.url, &hosted.anon_key, &hosted.service_role_key)
            .with_bucket(&hosted.storage_bucket)
            .with_timeout(hosted.timeout_ms))
    }

    pub fn doh_config(&self) -> DohConfig {
        DohConfig::new(&self.dns.doh_endpoint)
    }

    /// Messaging channels with credentials; unconfigured channels stay off
    pub fn messaging_config(&self) -> MessagingConfig {
        let mut config = MessagingConfig::new();

        let whatsapp = &self.messaging.whatsapp;
        if !whatsapp.phone_number_id.is_empty() && !whatsapp.access_token.is_empty() {
            let mut channel = WhatsAppConfig::new(&whatsapp.phone_number_id, &whatsapp.access_token);
            if let Some(ref base) = whatsapp.api_base {
                channel = channel.with_api_base(base);
            }
            config = config.with_whatsapp(channel);
        }

        let email = &self.messaging.email;
        if !email.api_key.is_empty() && !email.from.is_empty() {
            let mut channel = EmailConfig::new(&email.api_key, &email.from);
            if let Some(ref base) = email.api_base {
                channel = channel.with_api_base(base);
            }
            config = config.with_email(channel);
        }

        config
    }

    /// Payments config. Redirects default to the public URL.
    pub fn payments_config(&self) -> PaymentsConfig {
        let payments = &self.payments;
        let public_url = self.platform.public_url.trim_end_matches('/');
        let refresh_url = payments
            .refresh_url
            .clone()
            .unwrap_or_else(|| format!("{}/provider/onboarding/refresh", public_url));
        let return_url = payments
            .return_url
            .clone()
            .unwrap_or_else(|| format!("{}/provider/onboarding/complete", public_url));

        let mut config = PaymentsConfig::new(&payments.secret_key).with_redirects(refresh_url, return_url);
        if let Some(ref base) = payments.api_base {
            config = config.with_api_base(base);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = TidyConfig::default();
        assert_eq!(config.endpoint, "http://localhost:3000");
        assert_eq!(config.timeout, 30);
        assert_eq!(config.backend, Backend::InMemory);
        assert_eq!(config.server.bind_address.port(), 3000);
        assert_eq!(config.hosted.storage_bucket, "claim-photos");
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "endpoint: http://example.com:9000").unwrap();
        writeln!(temp_file, "backend: hosted").unwrap();
        writeln!(temp_file, "server:").unwrap();
        writeln!(temp_file, "  bind_address: \"127.0.0.1:8081\"").unwrap();
        writeln!(temp_file, "hosted:").unwrap();
        writeln!(temp_file, "  url: https://project.example.co").unwrap();
        writeln!(temp_file, "  anon_key: anon").unwrap();
        writeln!(temp_file, "  service_role_key: service").unwrap();

        let config = TidyConfig::load(&Some(temp_file.path().to_path_buf())).unwrap();
        assert_eq!(config.endpoint, "http://example.com:9000");
        assert_eq!(config.backend, Backend::Hosted);
        assert_eq!(config.server.bind_address, SocketAddr::from(([127, 0, 0, 1], 8081)));
        // Unset keys keep their defaults
        assert!(config.server.enable_cors);
        assert_eq!(config.hosted.storage_bucket, "claim-photos");

        let hosted = config.hosted_config().unwrap();
        assert_eq!(hosted.url, "https://project.example.co");
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let result = TidyConfig::load(&Some(PathBuf::from("/definitely/not/here.yaml")));
        assert!(matches!(result, Err(CoreError::Configuration(_))));
    }

    #[test]
    fn test_hosted_config_requires_credentials() {
        let config = TidyConfig::default();
        let error = config.hosted_config().unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid configuration: hosted.url is required for the hosted backend"
        );
    }

    #[test]
    fn test_cli_overrides() {
        let args = Cli::parse_from([
            "tidyctl",
            "--endpoint",
            "http://api.tidyhub.test",
            "--token",
            "root-token",
            "--format",
            "json",
            "health",
        ]);
        let config = TidyConfig::default().with_overrides(&args);
        assert_eq!(config.endpoint, "http://api.tidyhub.test");
        assert_eq!(config.auth_token.as_deref(), Some("root-token"));
        assert_eq!(config.default_format, OutputFormat::Json);
    }

    #[test]
    fn test_api_url_generation() {
        let config = TidyConfig {
            endpoint: "http://example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.api_url("/api/root/tenants"), "http://example.com/api/root/tenants");
    }

    #[test]
    fn test_messaging_channels_need_credentials() {
        let mut config = TidyConfig::default();
        let messaging = config.messaging_config();
        assert!(messaging.whatsapp.is_none());
        assert!(messaging.email.is_none());

        config.messaging.email = EmailSettings {
            api_key: "re_123".to_string(),
            from: "TidyHub <hello@tidyhub.app>".to_string(),
            api_base: None,
        };
        let messaging = config.messaging_config();
        assert!(messaging.whatsapp.is_none());
        assert_eq!(messaging.email.unwrap().from, "TidyHub <hello@tidyhub.app>");
    }

    #[test]
    fn test_payment_redirects_default_to_public_url() {
        let mut config = TidyConfig::default();
        config.platform.public_url = "https://app.tidyhub.test/".to_string();
        let payments = config.payments_config();
        assert_eq!(payments.refresh_url, "https://app.tidyhub.test/provider/onboarding/refresh");
        assert_eq!(payments.return_url, "https://app.tidyhub.test/provider/onboarding/complete");
    }
}
