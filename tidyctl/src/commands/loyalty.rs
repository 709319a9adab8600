//! Offline loyalty calculations

use crate::cli::LoyaltyCommands;
use crate::config::TidyConfig;
use crate::output;
use tidyhub_core::errors::CoreError;
use tidyhub_core::services::loyalty::{redemption_quote, RedemptionQuote, DEFAULT_REDEMPTION_CAP_PERCENT};

pub fn handle_loyalty_command(command: LoyaltyCommands, config: &TidyConfig) -> Result<(), CoreError> {
    match command {
        LoyaltyCommands::Quote {
            balance,
            subtotal_cents,
            cap,
            requested,
        } => {
            let quote = quote(balance, subtotal_cents, cap, requested)?;
            output::display_redemption_quote(&quote, &config.default_format)
        }
    }
}

fn quote(balance: i64, subtotal_cents: i64, cap: Option<u32>, requested: Option<i64>) -> Result<RedemptionQuote, CoreError> {
    if subtotal_cents <= 0 {
        return Err(CoreError::validation("subtotal_cents must be greater than 0"));
    }
    let cap = cap.unwrap_or(DEFAULT_REDEMPTION_CAP_PERCENT);
    if cap > 100 {
        return Err(CoreError::validation("cap must be between 0 and 100"));
    }
    Ok(redemption_quote(balance, subtotal_cents, cap, requested))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_uses_default_cap() {
        // 20% of 100.00 is 20.00, i.e. 200 points
        let quote = quote(1_000, 10_000, None, None).unwrap();
        assert_eq!(quote.cap_points, 200);
        assert_eq!(quote.points_applied, 200);
        assert_eq!(quote.discount_cents, 2_000);
    }

    #[test]
    fn test_quote_rejects_bad_input() {
        assert!(quote(1_000, 0, None, None).is_err());
        assert!(quote(1_000, 10_000, Some(101), None).is_err());
    }
}
