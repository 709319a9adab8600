//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tidyctl")]
#[command(about = "TidyHub marketplace control tool")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// TidyHub API endpoint URL
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,

    /// Bearer token for root admin API calls
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server
    Serve(ServeArgs),
    /// Check a running server
    Health,
    /// Tenant management (root admin)
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },
    /// Loyalty calculations
    Loyalty {
        #[command(subcommand)]
        command: LoyaltyCommands,
    },
    /// Membership calculations
    Membership {
        #[command(subcommand)]
        command: MembershipCommands,
    },
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,
    /// Storage backend
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,
}

#[derive(Subcommand)]
pub enum TenantCommands {
    /// List all tenants
    List,
    /// Create a new tenant
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,
        /// URL-safe unique handle
        #[arg(short, long)]
        slug: String,
        /// Commercial plan
        #[arg(short, long)]
        plan: Option<String>,
    },
    /// Describe a specific tenant
    Describe {
        /// Tenant ID
        tenant_id: String,
    },
    /// Activate or suspend a tenant
    Status {
        /// Tenant ID
        tenant_id: String,
        /// New status
        #[arg(value_enum)]
        status: TenantStatusArg,
    },
}

#[derive(Subcommand)]
pub enum LoyaltyCommands {
    /// Quote a points redemption against a subtotal
    Quote {
        /// Points balance
        #[arg(long)]
        balance: i64,
        /// Booking subtotal in cents
        #[arg(long)]
        subtotal_cents: i64,
        /// Redemption cap as a percentage of the subtotal
        #[arg(long)]
        cap: Option<u32>,
        /// Points the customer asks to redeem
        #[arg(long)]
        requested: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum MembershipCommands {
    /// Price an upgrade between plans
    Prorate {
        /// Current plan
        #[arg(long)]
        from: String,
        /// Target plan
        #[arg(long)]
        to: String,
        /// Days left on the current membership
        #[arg(long)]
        days_remaining: i64,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TenantStatusArg {
    Active,
    Suspended,
}

impl TenantStatusArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatusArg::Active => "active",
            TenantStatusArg::Suspended => "suspended",
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Process-local store; data is lost on exit
    #[default]
    InMemory,
    /// Hosted Postgres REST gateway, auth and storage
    Hosted,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::InMemory => write!(f, "in_memory"),
            Backend::Hosted => write!(f, "hosted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_loyalty_quote() {
        let cli = Cli::parse_from([
            "tidyctl",
            "loyalty",
            "quote",
            "--balance",
            "450",
            "--subtotal-cents",
            "10000",
            "--requested",
            "300",
        ]);
        match cli.command {
            Commands::Loyalty {
                command: LoyaltyCommands::Quote { balance, subtotal_cents, cap, requested },
            } => {
                assert_eq!(balance, 450);
                assert_eq!(subtotal_cents, 10_000);
                assert_eq!(cap, None);
                assert_eq!(requested, Some(300));
            }
            _ => panic!("expected loyalty quote"),
        }
    }

    #[test]
    fn test_parse_serve_with_globals() {
        let cli = Cli::parse_from(["tidyctl", "-vv", "serve", "--bind", "127.0.0.1:8080", "--backend", "hosted"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.bind, Some(SocketAddr::from(([127, 0, 0, 1], 8080))));
                assert_eq!(args.backend, Some(Backend::Hosted));
            }
            _ => panic!("expected serve"),
        }
    }
}
