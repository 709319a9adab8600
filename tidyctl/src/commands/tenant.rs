//! Tenant management command implementations

use crate::cli::{TenantCommands, TenantStatusArg};
use crate::client::TidyClient;
use crate::config::TidyConfig;
use crate::output;
use colored::*;
use serde_json::json;
use tidyhub_core::errors::CoreError;
use tidyhub_core::tenant::TenantInfo;
use tidyhub_core::types::TenantId;
use tracing::{info, warn};

/// Handle tenant management commands
pub async fn handle_tenant_command(command: TenantCommands, config: &TidyConfig) -> Result<(), CoreError> {
    if config.auth_token.is_none() {
        warn!("No auth token configured; tenant commands need a root admin token");
    }
    let client = TidyClient::new(config.clone())?;

    match command {
        TenantCommands::List => list_tenants(&client, config).await,
        TenantCommands::Create { name, slug, plan } => create_tenant(&client, config, name, slug, plan).await,
        TenantCommands::Describe { tenant_id } => describe_tenant(&client, &tenant_id, config).await,
        TenantCommands::Status { tenant_id, status } => set_status(&client, &tenant_id, status, config).await,
    }
}

async fn list_tenants(client: &TidyClient, config: &TidyConfig) -> Result<(), CoreError> {
    info!("Listing tenants");

    let response = client.get("/api/root/tenants").await?;
    let tenants: Vec<TenantInfo> = client.handle_field(response, "tenants").await?;
    output::display_tenants(&tenants, &config.default_format)
}

async fn create_tenant(
    client: &TidyClient,
    config: &TidyConfig,
    name: String,
    slug: String,
    plan: Option<String>,
) -> Result<(), CoreError> {
    info!("Creating tenant: {}", slug);

    let body = json!({ "name": name, "slug": slug, "plan": plan });
    let response = client.post("/api/root/tenants", &body).await?;
    let tenant: TenantInfo = client.handle_field(response, "tenant").await?;

    println!("{}", format!("✓ Tenant '{}' created", tenant.slug).green().bold());
    output::display_tenant_details(&tenant, &config.default_format)
}

async fn describe_tenant(client: &TidyClient, tenant_id: &str, config: &TidyConfig) -> Result<(), CoreError> {
    let tenant_id = TenantId::parse_v4(tenant_id)?;
    info!("Describing tenant: {}", tenant_id);

    let response = client.get(&format!("/api/root/tenants/{}", tenant_id)).await?;
    let tenant: TenantInfo = client.handle_field(response, "tenant").await?;
    output::display_tenant_details(&tenant, &config.default_format)
}

async fn set_status(
    client: &TidyClient,
    tenant_id: &str,
    status: TenantStatusArg,
    config: &TidyConfig,
) -> Result<(), CoreError> {
    let tenant_id = TenantId::parse_v4(tenant_id)?;
    if status == TenantStatusArg::Suspended {
        warn!("Suspending tenant {}; its users will be refused until reactivated", tenant_id);
    }

    let body = json!({ "status": status.as_str() });
    let response = client.patch(&format!("/api/root/tenants/{}/status", tenant_id), &body).await?;
    let tenant: TenantInfo = client.handle_field(response, "tenant").await?;

    println!("{}", format!("✓ Tenant '{}' is now {}", tenant.slug, tenant.status).green().bold());
    output::display_tenant_details(&tenant, &config.default_format)
}
