//! Health check command implementation

use crate::client::{HealthResponse, TidyClient};
use crate::config::TidyConfig;
use colored::*;
use tidyhub_core::errors::CoreError;
use tracing::info;

/// Handle health check command
pub async fn handle_health_command(config: &TidyConfig) -> Result<(), CoreError> {
    let client = TidyClient::new(config.clone())?;

    info!("Checking TidyHub health at {}", config.endpoint);

    match check_health(&client).await {
        Ok(health) => {
            println!("{}", "✓ TidyHub is healthy".green().bold());
            println!("Status: {}", health.status.green());
            if let Some(version) = health.version {
                println!("Version: {}", version);
            }
            println!("Timestamp: {}", health.timestamp);
            Ok(())
        }
        Err(e) => {
            println!("{}", "✗ TidyHub health check failed".red().bold());
            println!("Error: {}", e.to_string().red());
            Err(e)
        }
    }
}

async fn check_health(client: &TidyClient) -> Result<HealthResponse, CoreError> {
    let response = client.get("/health").await?;
    client.handle_response(response).await
}
