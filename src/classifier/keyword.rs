//! Keyword-based fallback classifier
//!
//! Deterministic scoring over a fixed taxonomy. No allocation beyond the
//! lower-cased message; no I/O.

use super::{extract_entities, Classifier};
use crate::models::{Entities, Intent, IntentMethod, IntentResult, SessionContextView};
use crate::Result;
use async_trait::async_trait;
use tracing::debug;

/// Intent taxonomy: keyword phrases per intent, in declaration order.
/// Scoring ties resolve to the earliest entry, so the order here is part of
/// the contract, not a cosmetic choice.
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Faq,
        &[
            "hour", "open", "close", "timing", "fee", "charge", "cost", "product", "service",
            "branch", "atm", "location", "interest rate",
        ],
    ),
    (
        Intent::CheckBalance,
        &["balance", "how much", "account", "money", "check account"],
    ),
    (
        Intent::TransactionHistory,
        &[
            "transaction", "history", "statement", "spent", "purchase", "recent", "last month",
        ],
    ),
    (
        Intent::TransferFunds,
        &["transfer", "send money", "move", "wire"],
    ),
    (
        Intent::UnlockCard,
        &["unlock", "unblock", "reactivate", "card"],
    ),
    (
        Intent::LockCard,
        &["lock", "freeze", "lost", "stolen", "card"],
    ),
    (
        Intent::PayBill,
        &["pay bill", "bill", "payment", "auto-pay", "recurring", "utilities"],
    ),
    (
        Intent::GeneralQuery,
        &["change", "update", "cancel", "modify", "help"],
    ),
];

pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Score each intent by keyword hits and pick the best.
    ///
    /// Score = number of keyword phrases found as substrings, plus 0.5 once
    /// if the message starts with any matched keyword. Best score > 0 maps
    /// to confidence `min(0.5 + 0.15 * score, 0.95)`; no hits at all default
    /// to `general_query` at 0.50 with empty entities.
    pub fn classify_message(&self, message: &str, _context: &SessionContextView) -> IntentResult {
        let msg_lower = message.to_lowercase();

        let mut best: Option<(Intent, f32)> = None;

        for (intent, keywords) in INTENT_KEYWORDS {
            let matched: Vec<&str> = keywords
                .iter()
                .copied()
                .filter(|kw| msg_lower.contains(kw))
                .collect();

            if matched.is_empty() {
                continue;
            }

            let mut score = matched.len() as f32;
            if matched.iter().any(|kw| msg_lower.starts_with(kw)) {
                score += 0.5;
            }

            // Strict comparison keeps the first-declared intent on ties.
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((*intent, score));
            }
        }

        match best {
            Some((intent, score)) => {
                let confidence = (0.5 + score * 0.15).min(0.95);
                debug!(
                    intent = %intent,
                    confidence,
                    score,
                    "Keyword classification"
                );

                IntentResult {
                    intent,
                    confidence,
                    entities: extract_entities(message),
                    method: IntentMethod::Keyword,
                }
            }
            None => {
                debug!("No keyword matches, defaulting to general_query");

                IntentResult {
                    intent: Intent::GeneralQuery,
                    confidence: 0.50,
                    entities: Entities::default(),
                    method: IntentMethod::Default,
                }
            }
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, message: &str, context: &SessionContextView) -> Result<IntentResult> {
        Ok(self.classify_message(message, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(message: &str) -> IntentResult {
        KeywordClassifier::new().classify_message(message, &SessionContextView::default())
    }

    #[test]
    fn test_balance_query() {
        let result = classify("What's my balance?");
        assert_eq!(result.intent, Intent::CheckBalance);
        assert_eq!(result.method, IntentMethod::Keyword);
        assert!((result.confidence - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_message_defaults() {
        let result = classify("xyz123");
        assert_eq!(result.intent, Intent::GeneralQuery);
        assert_eq!(result.method, IntentMethod::Default);
        assert!((result.confidence - 0.50).abs() < 1e-6);
        assert!(result.entities.is_empty());
    }

    #[test]
    fn test_lock_vs_unlock() {
        let locked = classify("lock my card");
        assert_eq!(locked.intent, Intent::LockCard);

        let unlocked = classify("unlock my card");
        assert_eq!(unlocked.intent, Intent::UnlockCard);

        let frozen = classify("freeze my card, it was stolen");
        assert_eq!(frozen.intent, Intent::LockCard);
    }

    #[test]
    fn test_transfer_with_entities() {
        let result = classify("transfer $500 to savings");
        assert_eq!(result.intent, Intent::TransferFunds);
        assert_eq!(result.entities.amount, Some(500.0));
        assert_eq!(result.entities.account_type.as_deref(), Some("savings"));
    }

    #[test]
    fn test_transaction_history() {
        let result = classify("show recent transactions");
        assert_eq!(result.intent, Intent::TransactionHistory);
        // two keyword hits, no leading-keyword bonus
        assert!((result.confidence - 0.80).abs() < 1e-6);
    }

    #[test]
    fn test_pay_bill() {
        let result = classify("pay my electricity bill");
        assert_eq!(result.intent, Intent::PayBill);
    }

    #[test]
    fn test_faq_hours() {
        let result = classify("what are your opening hours?");
        assert_eq!(result.intent, Intent::Faq);
    }

    #[test]
    fn test_leading_keyword_bonus() {
        // "balance please" starts with a matched keyword, "my balance" does not
        let leading = classify("balance please");
        let embedded = classify("my balance");
        assert!(leading.confidence > embedded.confidence);
    }

    #[test]
    fn test_confidence_caps_at_095() {
        let result = classify(
            "transaction history statement spent purchase recent last month transactions",
        );
        assert!(result.confidence <= 0.95);
    }
}
