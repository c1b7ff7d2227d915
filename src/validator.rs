//! Transaction validation
//!
//! Business-rule checks per transaction kind. Pure functions of their
//! inputs; the first failing rule produces the single returned error.

use crate::config::Settings;
use crate::models::{AuthContext, TransactionParams, TransactionType, ValidationOutcome};

pub struct TransactionValidator {
    transfer_daily_limit: f64,
    bill_payment_daily_limit: f64,
}

impl TransactionValidator {
    pub fn new(transfer_daily_limit: f64, bill_payment_daily_limit: f64) -> Self {
        Self {
            transfer_daily_limit,
            bill_payment_daily_limit,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.transfer_daily_limit,
            settings.bill_payment_daily_limit,
        )
    }

    pub fn validate(
        &self,
        kind: TransactionType,
        params: &TransactionParams,
        _auth: &AuthContext,
    ) -> ValidationOutcome {
        // Unresolved card choice short-circuits regardless of kind
        if params.needs_clarification {
            return ValidationOutcome::rejected("Please specify which card to use");
        }

        match kind {
            TransactionType::TransferFunds => self.validate_transfer(params),
            TransactionType::LockCard | TransactionType::UnlockCard => validate_card(params),
            TransactionType::PayBill => self.validate_bill_payment(params),
            // No domain rules defined yet; intentionally an open surface for
            // future limit checks rather than a silent gap.
            TransactionType::UpdateLimits => ValidationOutcome::ok(),
        }
    }

    fn validate_transfer(&self, params: &TransactionParams) -> ValidationOutcome {
        let amount = params.amount.unwrap_or(0.0);

        if amount <= 0.0 {
            return ValidationOutcome::rejected("Transfer amount must be greater than zero");
        }

        if amount > self.transfer_daily_limit {
            return ValidationOutcome::rejected(format!(
                "Transfer amount exceeds the daily limit of SGD {}",
                self.transfer_daily_limit
            ));
        }

        let has_from = params.from_account.as_deref().is_some_and(|a| !a.is_empty());
        let has_to = params.to_account.as_deref().is_some_and(|a| !a.is_empty());
        if !has_from || !has_to {
            return ValidationOutcome::rejected(
                "Both source and destination accounts are required",
            );
        }

        ValidationOutcome::ok()
    }

    fn validate_bill_payment(&self, params: &TransactionParams) -> ValidationOutcome {
        if params.payee.as_deref().map_or(true, |p| p.is_empty()) {
            return ValidationOutcome::rejected("Payee information is required");
        }

        let amount = params.amount.unwrap_or(0.0);

        if amount <= 0.0 {
            return ValidationOutcome::rejected("Payment amount must be greater than zero");
        }

        if amount > self.bill_payment_daily_limit {
            return ValidationOutcome::rejected(format!(
                "Bill payment exceeds the daily limit of SGD {}",
                self.bill_payment_daily_limit
            ));
        }

        ValidationOutcome::ok()
    }
}

fn validate_card(params: &TransactionParams) -> ValidationOutcome {
    if params.card_id.as_deref().map_or(true, |c| c.is_empty()) {
        return ValidationOutcome::rejected("Card ID is required");
    }

    ValidationOutcome::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn auth() -> AuthContext {
        AuthContext {
            user_id: "user_001".to_string(),
            authenticated: true,
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::minutes(30),
        }
    }

    fn validator() -> TransactionValidator {
        TransactionValidator::new(50_000.0, 20_000.0)
    }

    fn transfer_params(amount: f64) -> TransactionParams {
        TransactionParams {
            amount: Some(amount),
            from_account: Some("savings".to_string()),
            to_account: Some("checking".to_string()),
            ..TransactionParams::default()
        }
    }

    #[test]
    fn test_valid_transfer() {
        let outcome = validator().validate(
            TransactionType::TransferFunds,
            &transfer_params(500.0),
            &auth(),
        );
        assert!(outcome.valid);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_transfer_over_limit() {
        let outcome = validator().validate(
            TransactionType::TransferFunds,
            &transfer_params(60_000.0),
            &auth(),
        );
        assert!(!outcome.valid);
        assert!(outcome.error.unwrap().contains("50000"));
    }

    #[test]
    fn test_transfer_zero_amount() {
        let outcome = validator().validate(
            TransactionType::TransferFunds,
            &transfer_params(0.0),
            &auth(),
        );
        assert!(!outcome.valid);
        assert!(outcome.error.unwrap().contains("greater than zero"));
    }

    #[test]
    fn test_transfer_missing_accounts() {
        let params = TransactionParams {
            amount: Some(100.0),
            ..TransactionParams::default()
        };
        let outcome = validator().validate(TransactionType::TransferFunds, &params, &auth());
        assert!(!outcome.valid);
        assert!(outcome.error.unwrap().contains("accounts are required"));
    }

    #[test]
    fn test_amount_rule_wins_over_account_rule() {
        // both rules broken; the amount rule is declared first
        let params = TransactionParams {
            amount: Some(-5.0),
            ..TransactionParams::default()
        };
        let outcome = validator().validate(TransactionType::TransferFunds, &params, &auth());
        assert!(outcome.error.unwrap().contains("greater than zero"));
    }

    #[test]
    fn test_card_lock_requires_card_id() {
        let outcome = validator().validate(
            TransactionType::LockCard,
            &TransactionParams::default(),
            &auth(),
        );
        assert!(!outcome.valid);
        assert!(outcome.error.unwrap().contains("Card ID"));

        let params = TransactionParams {
            card_id: Some("card_001".to_string()),
            ..TransactionParams::default()
        };
        assert!(validator()
            .validate(TransactionType::UnlockCard, &params, &auth())
            .valid);
    }

    #[test]
    fn test_needs_clarification_short_circuits() {
        let params = TransactionParams {
            card_id: Some("card_001".to_string()),
            needs_clarification: true,
            ..TransactionParams::default()
        };
        let outcome = validator().validate(TransactionType::LockCard, &params, &auth());
        assert!(!outcome.valid);
        assert!(outcome.error.unwrap().contains("Please specify"));
    }

    #[test]
    fn test_bill_payment_rules_in_order() {
        let validator = validator();

        let missing_payee = TransactionParams {
            amount: Some(100.0),
            ..TransactionParams::default()
        };
        let outcome = validator.validate(TransactionType::PayBill, &missing_payee, &auth());
        assert!(outcome.error.unwrap().contains("Payee"));

        let zero_amount = TransactionParams {
            payee: Some("electricity".to_string()),
            ..TransactionParams::default()
        };
        let outcome = validator.validate(TransactionType::PayBill, &zero_amount, &auth());
        assert!(outcome.error.unwrap().contains("greater than zero"));

        let over_limit = TransactionParams {
            payee: Some("electricity".to_string()),
            amount: Some(25_000.0),
            ..TransactionParams::default()
        };
        let outcome = validator.validate(TransactionType::PayBill, &over_limit, &auth());
        assert!(outcome.error.unwrap().contains("20000"));

        let ok = TransactionParams {
            payee: Some("electricity".to_string()),
            amount: Some(120.0),
            ..TransactionParams::default()
        };
        assert!(validator.validate(TransactionType::PayBill, &ok, &auth()).valid);
    }

    #[test]
    fn test_update_limits_valid_by_default() {
        let outcome = validator().validate(
            TransactionType::UpdateLimits,
            &TransactionParams::default(),
            &auth(),
        );
        assert!(outcome.valid);
    }
}
