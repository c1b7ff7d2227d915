//! Fraud scoring
//!
//! Velocity tracking and amount checks over proposed transactions. The
//! per-user attempt log is shared across sessions (one user can hold many
//! concurrent conversations) and lives behind its own lock.

use crate::config::Settings;
use crate::models::{FraudAssessment, Transaction};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;

const VELOCITY_RISK: f32 = 0.4;
const AMOUNT_RISK: f32 = 0.3;
const SUSPICION_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone)]
struct AttemptRecord {
    timestamp: DateTime<Utc>,
    #[allow(dead_code)]
    transaction_id: uuid::Uuid,
}

pub struct FraudScorer {
    attempts: Mutex<HashMap<String, Vec<AttemptRecord>>>,
    velocity_limit: usize,
    velocity_window: Duration,
    amount_threshold: f64,
}

impl FraudScorer {
    pub fn new(velocity_limit: usize, velocity_window_secs: i64, amount_threshold: f64) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            velocity_limit,
            velocity_window: Duration::seconds(velocity_window_secs),
            amount_threshold,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.fraud_velocity_limit,
            settings.fraud_velocity_window_secs,
            settings.fraud_amount_threshold,
        )
    }

    /// Score a proposed transaction.
    ///
    /// The attempt is recorded unconditionally so velocity reflects attempts
    /// rather than successes, and the log is pruned to the rolling window on
    /// every check to bound memory.
    pub async fn check(&self, transaction: &Transaction) -> FraudAssessment {
        let now = Utc::now();
        let cutoff = now - self.velocity_window;

        let mut attempts = self.attempts.lock().await;
        let user_log = attempts.entry(transaction.user_id.clone()).or_default();
        user_log.retain(|attempt| attempt.timestamp > cutoff);

        let recent_count = user_log.len();

        let mut risk_score = 0.0_f32;
        let mut reasons = Vec::new();

        if recent_count >= self.velocity_limit {
            risk_score += VELOCITY_RISK;
            reasons.push("High transaction velocity".to_string());
        }

        if transaction.params.amount.unwrap_or(0.0) > self.amount_threshold {
            risk_score += AMOUNT_RISK;
            reasons.push("Large transaction amount".to_string());
        }

        user_log.push(AttemptRecord {
            timestamp: now,
            transaction_id: transaction.id,
        });

        let is_suspicious = risk_score >= SUSPICION_THRESHOLD;
        if is_suspicious {
            warn!(
                transaction_id = %transaction.id,
                user_id = %transaction.user_id,
                risk_score,
                "Suspicious transaction detected"
            );
        }

        FraudAssessment {
            is_suspicious,
            reasons,
            risk_score,
        }
    }

    /// Attempts inside the current window for a user. Exposed for
    /// observability and tests.
    pub async fn recent_attempts(&self, user_id: &str) -> usize {
        let cutoff = Utc::now() - self.velocity_window;
        let attempts = self.attempts.lock().await;

        attempts
            .get(user_id)
            .map(|log| log.iter().filter(|a| a.timestamp > cutoff).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TransactionType, TransactionParams};

    fn transaction_for(user: &str, amount: Option<f64>) -> Transaction {
        let mut tx = Transaction::new(TransactionType::TransferFunds, user);
        tx.params = TransactionParams {
            amount,
            ..TransactionParams::default()
        };
        tx
    }

    #[tokio::test]
    async fn test_quiet_user_is_clean() {
        let scorer = FraudScorer::new(3, 3600, 10_000.0);

        let assessment = scorer.check(&transaction_for("u1", Some(100.0))).await;
        assert!(!assessment.is_suspicious);
        assert_eq!(assessment.risk_score, 0.0);
        assert!(assessment.reasons.is_empty());
        assert_eq!(scorer.recent_attempts("u1").await, 1);
    }

    #[tokio::test]
    async fn test_velocity_alone_is_not_suspicious() {
        let scorer = FraudScorer::new(3, 3600, 10_000.0);

        for _ in 0..3 {
            scorer.check(&transaction_for("u1", Some(50.0))).await;
        }

        // 4th attempt sees 3 prior attempts inside the window
        let assessment = scorer.check(&transaction_for("u1", Some(50.0))).await;
        assert!((assessment.risk_score - 0.4).abs() < 1e-6);
        assert_eq!(assessment.reasons, vec!["High transaction velocity"]);
        assert!(!assessment.is_suspicious);
    }

    #[tokio::test]
    async fn test_velocity_plus_amount_blocks() {
        let scorer = FraudScorer::new(3, 3600, 10_000.0);

        for _ in 0..3 {
            scorer.check(&transaction_for("u1", Some(50.0))).await;
        }

        let assessment = scorer.check(&transaction_for("u1", Some(15_000.0))).await;
        assert!((assessment.risk_score - 0.7).abs() < 1e-6);
        assert!(assessment.is_suspicious);
        assert_eq!(
            assessment.reasons,
            vec!["High transaction velocity", "Large transaction amount"]
        );
    }

    #[tokio::test]
    async fn test_large_amount_alone_is_flagged_not_blocked() {
        let scorer = FraudScorer::new(3, 3600, 10_000.0);

        let assessment = scorer.check(&transaction_for("u1", Some(25_000.0))).await;
        assert!((assessment.risk_score - 0.3).abs() < 1e-6);
        assert!(!assessment.is_suspicious);
    }

    #[tokio::test]
    async fn test_window_prunes_old_attempts() {
        // zero-width window: every prior attempt ages out immediately
        let scorer = FraudScorer::new(3, 0, 10_000.0);

        for _ in 0..5 {
            let assessment = scorer.check(&transaction_for("u1", Some(50.0))).await;
            assert!(!assessment.is_suspicious);
            assert_eq!(assessment.risk_score, 0.0);
        }
    }

    #[tokio::test]
    async fn test_users_are_tracked_independently() {
        let scorer = FraudScorer::new(3, 3600, 10_000.0);

        for _ in 0..4 {
            scorer.check(&transaction_for("busy", Some(50.0))).await;
        }

        let assessment = scorer.check(&transaction_for("quiet", Some(50.0))).await;
        assert_eq!(assessment.risk_score, 0.0);
    }
}
