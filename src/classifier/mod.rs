//! Intent classification
//!
//! Classifies user messages into banking intents. An optional LLM delegate
//! runs first; a deterministic keyword classifier is always available as the
//! fallback, so classification never fails and never blocks on I/O unless a
//! delegate is configured.

pub mod delegate;
pub mod keyword;

pub use delegate::DelegatedClassifier;
pub use keyword::KeywordClassifier;

use crate::models::{Entities, IntentResult, SessionContextView};
use crate::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

/// Capability interface for intent classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, message: &str, context: &SessionContextView) -> Result<IntentResult>;
}

/// Delegate-with-fallback composition.
///
/// The public `classify` is infallible: any delegate error falls through to
/// the keyword classifier without propagating.
pub struct IntentClassifier {
    delegate: Option<Arc<dyn Classifier>>,
    keyword: KeywordClassifier,
}

impl IntentClassifier {
    pub fn keyword_only() -> Self {
        Self {
            delegate: None,
            keyword: KeywordClassifier::new(),
        }
    }

    pub fn with_delegate(delegate: Arc<dyn Classifier>) -> Self {
        Self {
            delegate: Some(delegate),
            keyword: KeywordClassifier::new(),
        }
    }

    pub async fn classify(&self, message: &str, context: &SessionContextView) -> IntentResult {
        if let Some(delegate) = &self.delegate {
            match delegate.classify(message, context).await {
                Ok(result) => return result,
                Err(e) => {
                    warn!("Delegated classification failed: {}. Using fallback.", e);
                }
            }
        }

        self.keyword.classify_message(message, context)
    }
}

//
// ================= Entity Extraction =================
//

lazy_static! {
    // Monetary amount: optionally $-prefixed, comma-grouped or a plain digit
    // run, optional 2-decimal suffix.
    static ref AMOUNT_RE: Regex =
        Regex::new(r"\$?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)").unwrap();
    // Bare 4-digit token, candidate last-4 of a card number.
    static ref CARD_RE: Regex = Regex::new(r"\b\d{4}\b").unwrap();
}

pub(crate) const ACCOUNT_TYPES: &[&str] = &["savings", "checking", "current", "credit"];
const DATE_KEYWORDS: &[&str] = &["today", "yesterday", "last week", "last month"];

/// Extract entities from a message.
///
/// Intent-agnostic. Check order is fixed: amount, card last-4, account type,
/// date reference; the first hit per category wins.
pub fn extract_entities(message: &str) -> Entities {
    let mut entities = Entities::default();
    let msg_lower = message.to_lowercase();

    if let Some(caps) = AMOUNT_RE.captures(message) {
        let raw = caps[1].replace(',', "");
        entities.amount = raw.parse().ok();
    }

    if let Some(m) = CARD_RE.find(message) {
        entities.card_last_four = Some(m.as_str().to_string());
    }

    entities.account_type = ACCOUNT_TYPES
        .iter()
        .find(|acc| msg_lower.contains(**acc))
        .map(|acc| (*acc).to_string());

    entities.date_reference = DATE_KEYWORDS
        .iter()
        .find(|kw| msg_lower.contains(**kw))
        .map(|kw| (*kw).to_string());

    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConciergeError;
    use crate::models::{Intent, IntentMethod};

    struct StubDelegate {
        reply: Result<IntentResult>,
    }

    #[async_trait]
    impl Classifier for StubDelegate {
        async fn classify(
            &self,
            _message: &str,
            _context: &SessionContextView,
        ) -> Result<IntentResult> {
            match &self.reply {
                Ok(result) => Ok(result.clone()),
                Err(_) => Err(ConciergeError::LlmError("delegate unavailable".to_string())),
            }
        }
    }

    #[test]
    fn test_extract_amount() {
        let entities = extract_entities("transfer $1,250.50 to savings");
        assert_eq!(entities.amount, Some(1250.50));
        assert_eq!(entities.account_type.as_deref(), Some("savings"));

        let entities = extract_entities("send 60000 to checking");
        assert_eq!(entities.amount, Some(60000.0));
    }

    #[test]
    fn test_extract_card_last_four() {
        let entities = extract_entities("lock my card ending 4532");
        assert_eq!(entities.card_last_four.as_deref(), Some("4532"));
    }

    #[test]
    fn test_extract_date_reference() {
        let entities = extract_entities("what did I spend last week");
        assert_eq!(entities.date_reference.as_deref(), Some("last week"));
    }

    #[test]
    fn test_no_entities() {
        let entities = extract_entities("hello there");
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn test_delegate_error_falls_back_to_keyword() {
        let classifier = IntentClassifier::with_delegate(Arc::new(StubDelegate {
            reply: Err(ConciergeError::LlmError("boom".to_string())),
        }));

        let result = classifier
            .classify("what's my balance?", &SessionContextView::default())
            .await;

        assert_eq!(result.intent, Intent::CheckBalance);
        assert_eq!(result.method, IntentMethod::Keyword);
    }

    #[tokio::test]
    async fn test_delegate_result_wins_when_available() {
        let classifier = IntentClassifier::with_delegate(Arc::new(StubDelegate {
            reply: Ok(IntentResult {
                intent: Intent::PayBill,
                confidence: 0.85,
                entities: Entities::default(),
                method: IntentMethod::Llm,
            }),
        }));

        let result = classifier
            .classify("settle my account", &SessionContextView::default())
            .await;

        assert_eq!(result.intent, Intent::PayBill);
        assert_eq!(result.method, IntentMethod::Llm);
    }
}
