//! Command-line interface for TidyHub

use clap::Parser;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod client;
mod commands;
mod config;
mod output;

use cli::*;
use config::TidyConfig;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // RUST_LOG wins over -v
    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = match TidyConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    let config = config.with_overrides(&args);

    let result = match args.command {
        Commands::Serve(serve) => commands::serve::handle_serve_command(serve, config).await,
        Commands::Health => commands::health::handle_health_command(&config).await,
        Commands::Tenant { command } => commands::tenant::handle_tenant_command(command, &config).await,
        Commands::Loyalty { command } => commands::loyalty::handle_loyalty_command(command, &config),
        Commands::Membership { command } => commands::membership::handle_membership_command(command, &config),
    };

    match result {
        Ok(()) => info!("Command completed successfully"),
        Err(e) => {
            error!("Command failed: {}", e);
            process::exit(1);
        }
    }
}
