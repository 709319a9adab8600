//! Offline membership calculations

use crate::cli::MembershipCommands;
use crate::config::TidyConfig;
use crate::output;
use tidyhub_core::errors::CoreError;
use tidyhub_core::services::membership::{prorate, Plan};

pub fn handle_membership_command(command: MembershipCommands, config: &TidyConfig) -> Result<(), CoreError> {
    match command {
        MembershipCommands::Prorate { from, to, days_remaining } => {
            let from: Plan = from.parse()?;
            let to: Plan = to.parse()?;
            let quote = prorate(from, to, days_remaining)?;
            output::display_upgrade_quote(&quote, &config.default_format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prorate_command() {
        let config = TidyConfig::default();
        let command = MembershipCommands::Prorate {
            from: "plus".to_string(),
            to: "premium".to_string(),
            days_remaining: 73,
        };
        assert!(handle_membership_command(command, &config).is_ok());

        let downgrade = MembershipCommands::Prorate {
            from: "premium".to_string(),
            to: "basic".to_string(),
            days_remaining: 10,
        };
        assert!(handle_membership_command(downgrade, &config).is_err());

        let unknown = MembershipCommands::Prorate {
            from: "gold".to_string(),
            to: "premium".to_string(),
            days_remaining: 10,
        };
        assert!(handle_membership_command(unknown, &config).is_err());
    }
}
