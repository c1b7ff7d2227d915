//! Response formatting
//!
//! Turns structured outcomes into conversational text. Templates only; no
//! state and no I/O.

use crate::models::{Account, Transaction, TransactionParams, TransactionType};

/// Confirmation prompt shown before a transaction executes
pub fn confirmation_message(kind: TransactionType, params: &TransactionParams) -> String {
    match kind {
        TransactionType::LockCard => "You're about to lock your card. This will:\n\
             - Prevent all new transactions\n\
             - Block ATM withdrawals\n\
             - Stop online purchases\n\n\
             You can unlock it anytime. Proceed?"
            .to_string(),
        TransactionType::UnlockCard => "You're about to unlock your card. It will be active again for all \
             transactions immediately. Proceed?"
            .to_string(),
        TransactionType::TransferFunds => format!(
            "Confirm transfer:\n\
             - Amount: SGD {:.2}\n\
             - From: {}\n\
             - To: {}\n\n\
             Proceed with this transfer?",
            params.amount.unwrap_or(0.0),
            params.from_account.as_deref().unwrap_or("N/A"),
            params.to_account.as_deref().unwrap_or("N/A"),
        ),
        TransactionType::PayBill => format!(
            "Confirm bill payment of SGD {:.2} to {}. Proceed?",
            params.amount.unwrap_or(0.0),
            params.payee.as_deref().unwrap_or("N/A"),
        ),
        TransactionType::UpdateLimits => "Please confirm this limit change.".to_string(),
    }
}

/// Success message for a completed transaction
pub fn success_message(transaction: &Transaction) -> String {
    let reference = transaction.reference.as_deref().unwrap_or("N/A");

    match transaction.kind {
        TransactionType::LockCard => format!(
            "Success! Your card has been locked.\n\n\
             Reference: {}\n\n\
             Next steps:\n\
             - Unlock anytime via the app or this assistant\n\
             - Request a replacement if the card is lost\n\
             - Call 1800-111-1111 to report fraud",
            reference
        ),
        TransactionType::UnlockCard => format!(
            "Your card is unlocked and ready to use.\nReference: {}",
            reference
        ),
        TransactionType::TransferFunds => format!(
            "Transfer completed.\n\
             - Amount: SGD {:.2}\n\
             - From: {}\n\
             - To: {}\n\
             - Reference: {}",
            transaction.params.amount.unwrap_or(0.0),
            transaction.params.from_account.as_deref().unwrap_or("N/A"),
            transaction.params.to_account.as_deref().unwrap_or("N/A"),
            reference
        ),
        _ => format!(
            "Transaction completed successfully.\nReference: {}",
            reference
        ),
    }
}

/// Generic execution-failure message. The raw gateway error stays out of
/// the user-facing text.
pub fn gateway_failure_message() -> String {
    "I couldn't complete this transaction right now. Please try again shortly \
     or visit a branch for assistance."
        .to_string()
}

/// Prompt listing the cards a clarification choice must pick from
pub fn clarification_prompt(params: &TransactionParams) -> String {
    let mut lines = vec!["You have more than one card on file. Which one do you mean?".to_string()];
    for card in &params.available_cards {
        lines.push(format!("- {} ending in {}", card.card_type, card.last_four));
    }
    lines.join("\n")
}

/// Natural-language account summary
pub fn account_summary(accounts: &[Account]) -> String {
    match accounts {
        [] => "I don't see any accounts associated with your profile. Please \
               contact support if you believe this is an error."
            .to_string(),
        [account] => format!(
            "Your {} account (ending in {}) has a balance of {} {:.2}.",
            account.account_type,
            last_four(&account.number),
            account.currency,
            account.balance
        ),
        accounts => {
            let mut lines = vec!["Here are your current account balances:".to_string(), String::new()];
            for account in accounts {
                lines.push(format!(
                    "- {} (****{}): {} {:.2}",
                    account.account_type,
                    last_four(&account.number),
                    account.currency,
                    account.balance
                ));
            }
            lines.push(String::new());
            lines.push("All balances are updated in real-time.".to_string());
            lines.join("\n")
        }
    }
}

/// Fixed menu shown when a message carries no recognizable signal
pub fn fallback_menu() -> String {
    "I'm not quite sure how to help with that. Here's what I can do:\n\n\
     **Account Services**\n\
     - Check your balance and transaction history\n\
     - View account details\n\n\
     **Card Management**\n\
     - Lock or unlock your cards\n\
     - Report lost or stolen cards\n\n\
     **Transactions**\n\
     - Transfer funds between accounts\n\
     - Pay bills\n\n\
     **Information**\n\
     - Branch hours and locations\n\
     - Fees and limits\n\n\
     What would you like to do?"
        .to_string()
}

pub fn auth_required_for_account() -> String {
    "To check your account information, I need to verify your identity first. \
     Please authenticate to continue."
        .to_string()
}

pub fn auth_required_for_transaction() -> String {
    "For security, I need to verify your identity before processing any \
     transactions. Please authenticate first."
        .to_string()
}

/// Canned FAQ answer when retrieval or generation is unavailable
pub fn faq_fallback() -> String {
    "I can help with general banking questions. What would you like to know \
     about accounts, cards, transfers, or branch services?"
        .to_string()
}

fn last_four(number: &str) -> &str {
    let len = number.len();
    if len >= 4 {
        &number[len - 4..]
    } else {
        number
    }
}
