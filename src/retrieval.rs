//! Retrieval collaborator
//!
//! The orchestrator treats retrieval as an opaque ranked-passage source.
//! `KeywordRetriever` is the in-process implementation: term-overlap scoring
//! over a seeded banking knowledge base, good enough to exercise the FAQ
//! path without a vector store.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A ranked passage returned by retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub source: String,
    pub score: f32,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>>;
}

/// Term-overlap retriever over an in-memory document set
pub struct KeywordRetriever {
    documents: Vec<(String, String)>,
}

impl KeywordRetriever {
    pub fn new(documents: Vec<(String, String)>) -> Self {
        Self { documents }
    }

    /// Seeded with the canned banking knowledge the assistant ships with
    pub fn with_default_knowledge() -> Self {
        let documents = vec![
            (
                "branch-hours".to_string(),
                "Most branches are open Monday to Friday 9:30 AM - 4:30 PM and \
                 Saturday 9:30 AM - 12:30 PM. All branches are closed on Sunday. \
                 ATMs are available 24/7."
                    .to_string(),
            ),
            (
                "account-fees".to_string(),
                "Savings accounts have no monthly fee if the balance stays above \
                 SGD 3,000. Credit card annual fees range from SGD 0 to SGD 642 \
                 depending on the card, and many fees are waived for qualifying \
                 customers."
                    .to_string(),
            ),
            (
                "transfer-limits".to_string(),
                "Daily transfer limits: SGD 50,000 between your own accounts, \
                 SGD 30,000 to other local accounts, SGD 20,000 to other banks. \
                 Higher limits can be arranged at a branch."
                    .to_string(),
            ),
            (
                "card-locking".to_string(),
                "You can lock a card instantly through the mobile app, online \
                 banking, or this assistant. Locking prevents all new \
                 transactions, ATM withdrawals and online purchases; you can \
                 unlock at any time."
                    .to_string(),
            ),
            (
                "bill-payments".to_string(),
                "Bill payments support one-off and recurring arrangements for \
                 most major billing organisations, with a daily limit of \
                 SGD 20,000."
                    .to_string(),
            ),
        ];

        Self::new(documents)
    }

    fn score(query_terms: &[String], content: &str) -> f32 {
        let content_lower = content.to_lowercase();
        let hits = query_terms
            .iter()
            .filter(|term| content_lower.contains(term.as_str()))
            .count();

        hits as f32 / query_terms.len().max(1) as f32
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>> {
        let query_terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .filter(|term| term.len() > 2)
            .map(|term| term.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|term| !term.is_empty())
            .collect();

        let mut passages: Vec<Passage> = self
            .documents
            .iter()
            .map(|(source, content)| Passage {
                content: content.clone(),
                source: source.clone(),
                score: Self::score(&query_terms, content),
            })
            .filter(|p| p.score > 0.0)
            .collect();

        passages.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        passages.truncate(top_k);

        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_retrieves_relevant_passage_first() {
        let retriever = KeywordRetriever::with_default_knowledge();

        let passages = retriever
            .retrieve("what are the branch opening hours", 3)
            .await
            .unwrap();

        assert!(!passages.is_empty());
        assert_eq!(passages[0].source, "branch-hours");
        assert!(passages.len() <= 3);
    }

    #[tokio::test]
    async fn test_no_match_returns_empty() {
        let retriever = KeywordRetriever::with_default_knowledge();

        let passages = retriever.retrieve("zzz qqq xxx", 3).await.unwrap();
        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn test_scores_are_descending() {
        let retriever = KeywordRetriever::with_default_knowledge();

        let passages = retriever
            .retrieve("daily transfer limits to other banks", 5)
            .await
            .unwrap();

        for pair in passages.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
