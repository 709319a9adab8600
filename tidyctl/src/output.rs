//! Output formatting utilities for tidyctl

use crate::cli::OutputFormat;
use colored::*;
use serde::Serialize;
use tabled::{Table, Tabled};
use tidyhub_core::errors::CoreError;
use tidyhub_core::services::loyalty::RedemptionQuote;
use tidyhub_core::services::membership::UpgradeQuote;
use tidyhub_core::tenant::{TenantInfo, TenantStatus};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CoreError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CoreError::Internal(format!("Failed to serialize to JSON: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Key/value listing used by the detail views
fn display_fields(title: &str, fields: &[(&str, String)], format: &OutputFormat) {
    match format {
        OutputFormat::Csv => {
            println!("field,value");
            for (name, value) in fields {
                println!("{},{}", name, escape_csv(value));
            }
        }
        _ => {
            println!("{}", title.bold().blue());
            for (name, value) in fields {
                println!("{:<18} {}", format!("{}:", name).bold(), value);
            }
        }
    }
}

/// Display a list of tenants
pub fn display_tenants(tenants: &[TenantInfo], format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Table => {
            if tenants.is_empty() {
                println!("No tenants found");
                return Ok(());
            }

            let table_data: Vec<TenantTableRow> = tenants
                .iter()
                .map(|t| TenantTableRow {
                    id: t.id.to_string(),
                    name: t.name.clone(),
                    slug: t.slug.clone(),
                    status: t.status.to_string(),
                    plan: t.plan.clone(),
                    created: t.created_at.format(DATE_FORMAT).to_string(),
                })
                .collect();

            println!("{}", Table::new(table_data));
        }
        OutputFormat::Json => print_json(tenants)?,
        OutputFormat::Csv => {
            println!("id,name,slug,status,plan,created");
            for tenant in tenants {
                println!(
                    "{},{},{},{},{},{}",
                    tenant.id,
                    escape_csv(&tenant.name),
                    tenant.slug,
                    tenant.status,
                    escape_csv(&tenant.plan),
                    tenant.created_at.format(DATE_FORMAT)
                );
            }
        }
    }
    Ok(())
}

/// Display detailed information about a single tenant
pub fn display_tenant_details(tenant: &TenantInfo, format: &OutputFormat) -> Result<(), CoreError> {
    if let OutputFormat::Json = format {
        return print_json(tenant);
    }

    let status = match format {
        OutputFormat::Table => format_status(&tenant.status),
        _ => tenant.status.to_string(),
    };
    let fields = [
        ("ID", tenant.id.to_string()),
        ("Name", tenant.name.clone()),
        ("Slug", tenant.slug.clone()),
        ("Status", status),
        ("Plan", tenant.plan.clone()),
        ("Loyalty cap", format!("{}%", tenant.redemption_cap_percent())),
        ("Created", tenant.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("Updated", tenant.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    ];
    display_fields("Tenant Details", &fields, format);
    Ok(())
}

/// Display a redemption quote
pub fn display_redemption_quote(quote: &RedemptionQuote, format: &OutputFormat) -> Result<(), CoreError> {
    if let OutputFormat::Json = format {
        return print_json(quote);
    }

    let reason = quote
        .reason
        .as_ref()
        .and_then(|r| serde_json::to_value(r).ok())
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "-".to_string());
    let fields = [
        ("Points applied", quote.points_applied.to_string()),
        ("Discount", format_cents(quote.discount_cents)),
        ("Usable points", quote.usable.to_string()),
        ("Cap points", quote.cap_points.to_string()),
        ("Reason", reason),
    ];
    display_fields("Redemption Quote", &fields, format);
    Ok(())
}

/// Display a prorated upgrade
pub fn display_upgrade_quote(quote: &UpgradeQuote, format: &OutputFormat) -> Result<(), CoreError> {
    if let OutputFormat::Json = format {
        return print_json(quote);
    }

    let fields = [
        ("From", quote.from.to_string()),
        ("To", quote.to.to_string()),
        ("Days remaining", quote.days_remaining.to_string()),
        ("Price difference", format_cents(quote.price_difference_cents)),
        ("Due now", format_cents(quote.prorated_cents)),
    ];
    display_fields("Membership Upgrade", &fields, format);
    Ok(())
}

/// Format status with color
fn format_status(status: &TenantStatus) -> String {
    match status {
        TenantStatus::Active => status.to_string().green().to_string(),
        TenantStatus::Suspended => status.to_string().yellow().to_string(),
        TenantStatus::Deleted => status.to_string().red().to_string(),
    }
}

/// Cents as a decimal amount
fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}

/// Escape CSV values
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Table row for tenant display
#[derive(Tabled)]
struct TenantTableRow {
    #[tabled(rename = "Tenant ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Slug")]
    slug: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Plan")]
    plan: String,
    #[tabled(rename = "Created")]
    created: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(1_250), "12.50");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-990), "-9.90");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("with\nnewline"), "\"with\nnewline\"");
    }
}
