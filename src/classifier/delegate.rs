//! LLM-delegated classifier
//!
//! Prompts the Mistral API with the full label set and accepts the reply
//! only when it contains one of the labels verbatim. Anything else is an
//! error for the fallback wrapper to swallow.

use super::Classifier;
use crate::error::ConciergeError;
use crate::mistral::MistralClient;
use crate::models::{Entities, Intent, IntentMethod, IntentResult, SessionContextView};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Confidence assigned to any accepted delegate classification
const DELEGATE_CONFIDENCE: f32 = 0.85;

pub struct DelegatedClassifier {
    llm: Arc<MistralClient>,
}

impl DelegatedClassifier {
    pub fn new(llm: Arc<MistralClient>) -> Self {
        Self { llm }
    }

    fn build_prompt(message: &str, context: &SessionContextView) -> String {
        let labels: Vec<&str> = Intent::ALL.iter().map(|i| i.label()).collect();

        let mut parts = vec![format!("Current message: {}", message)];
        if let Some(last) = context.last_intent {
            parts.push(format!("Previous intent: {}", last));
        }
        if context.transaction_state.is_some() {
            parts.push("User is in the middle of a transaction".to_string());
        }
        if context.message_count > 1 {
            parts.push(format!("Message {} in conversation", context.message_count));
        }

        format!(
            "Classify this banking query into one of these intents: {}\n\n{}\n\nIntent:",
            labels.join(", "),
            parts.join(" | ")
        )
    }
}

#[async_trait]
impl Classifier for DelegatedClassifier {
    async fn classify(&self, message: &str, context: &SessionContextView) -> Result<IntentResult> {
        let prompt = Self::build_prompt(message, context);
        let reply = self.llm.complete(&prompt).await?;
        let reply_lower = reply.to_lowercase();

        // Intent::ALL lists unlock_card before lock_card, so the longer
        // label wins containment checks against its substring sibling.
        for intent in Intent::ALL {
            if reply_lower.contains(intent.label()) {
                info!(intent = %intent, "LLM classification");

                return Ok(IntentResult {
                    intent,
                    confidence: DELEGATE_CONFIDENCE,
                    entities: Entities::default(),
                    method: IntentMethod::Llm,
                });
            }
        }

        Err(ConciergeError::ClassificationError(
            "delegate reply contained no known intent label".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_includes_labels_and_context() {
        let context = SessionContextView {
            last_intent: Some(Intent::CheckBalance),
            transaction_state: None,
            message_count: 3,
            elapsed_seconds: 12,
        };

        let prompt = DelegatedClassifier::build_prompt("lock my card", &context);

        assert!(prompt.contains("lock_card"));
        assert!(prompt.contains("general_query"));
        assert!(prompt.contains("Previous intent: check_balance"));
        assert!(prompt.contains("Message 3 in conversation"));
    }

    #[test]
    fn test_unlock_label_precedes_lock_in_containment_order() {
        let position_unlock = Intent::ALL
            .iter()
            .position(|i| *i == Intent::UnlockCard)
            .unwrap();
        let position_lock = Intent::ALL
            .iter()
            .position(|i| *i == Intent::LockCard)
            .unwrap();
        assert!(position_unlock < position_lock);
    }
}
