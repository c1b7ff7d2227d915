//! Transaction workflow engine
//!
//! State machine for multi-step transactions. Owns every transaction from
//! creation to a terminal state and runs the gates in fixed order:
//! parameter extraction, validation, fraud scoring, confirmation, ledger
//! execution. Fraud is only consulted after validation succeeds.

use crate::audit::{AuditLog, AuditRecord};
use crate::classifier::{extract_entities, ACCOUNT_TYPES};
use crate::error::ConciergeError;
use crate::fraud::FraudScorer;
use crate::gateway::LedgerGateway;
use crate::models::{
    AuthContext, Card, Entities, ExecutionOutcome, GatewayResult, Transaction, TransactionParams,
    TransactionState, TransactionType, WorkflowReply,
};
use crate::response;
use crate::session::ConversationSession;
use crate::validator::TransactionValidator;
use crate::Result;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const SUSPICIOUS_ACTIVITY_ERROR: &str = "blocked due to suspicious activity";

pub struct TransactionWorkflow {
    transactions: RwLock<HashMap<Uuid, Transaction>>,
    validator: TransactionValidator,
    fraud: Arc<FraudScorer>,
    ledger: Arc<dyn LedgerGateway>,
    audit: Arc<AuditLog>,
    ledger_timeout: Duration,
}

impl TransactionWorkflow {
    pub fn new(
        validator: TransactionValidator,
        fraud: Arc<FraudScorer>,
        ledger: Arc<dyn LedgerGateway>,
        audit: Arc<AuditLog>,
        ledger_timeout: Duration,
    ) -> Self {
        Self {
            transactions: RwLock::new(HashMap::new()),
            validator,
            fraud,
            ledger,
            audit,
            ledger_timeout,
        }
    }

    //
    // ================= Operations =================
    //

    /// Start a transaction workflow. Always leaves the transaction in a
    /// well-defined state; unexpected internal errors force `Failed` before
    /// a generic reply is returned.
    pub async fn initiate(
        &self,
        kind: TransactionType,
        message: &str,
        auth: &AuthContext,
        session: &mut ConversationSession,
    ) -> WorkflowReply {
        let transaction = Transaction::new(kind, &auth.user_id);
        let transaction_id = transaction.id;
        self.transactions
            .write()
            .await
            .insert(transaction_id, transaction);

        info!(
            transaction_id = %transaction_id,
            kind = %kind,
            user_id = %auth.user_id,
            "Transaction initiated"
        );

        match self
            .drive_initiate(transaction_id, kind, message, auth, session)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    transaction_id = %transaction_id,
                    "Transaction initiation failed: {}",
                    e
                );
                self.force_failed(transaction_id, "internal error during initiation")
                    .await;
                WorkflowReply::failure("Unable to initiate transaction. Please try again.")
            }
        }
    }

    /// Execute a confirmed transaction.
    ///
    /// The state gate is an atomic check-and-set under the table's write
    /// lock: only one caller can observe `PendingConfirmation` and move to
    /// `Executing`. Replays against terminal transactions and unknown ids
    /// are rejected without touching state or the ledger.
    pub async fn execute(
        &self,
        transaction_id: Uuid,
        auth: &AuthContext,
        session: &mut ConversationSession,
    ) -> Result<ExecutionOutcome> {
        let snapshot = {
            let mut transactions = self.transactions.write().await;
            let transaction = transactions
                .get_mut(&transaction_id)
                .ok_or(ConciergeError::TransactionNotFound(transaction_id))?;

            if transaction.user_id != auth.user_id {
                return Err(ConciergeError::IllegalState(
                    "transaction belongs to a different user".to_string(),
                ));
            }

            if transaction.state != TransactionState::PendingConfirmation {
                return Err(ConciergeError::IllegalState(format!(
                    "expected pending_confirmation, found {:?}",
                    transaction.state
                )));
            }

            transaction.state = TransactionState::Executing;
            transaction.clone()
        };

        debug!(transaction_id = %transaction_id, "Dispatching to ledger gateway");

        // A gateway timeout is a gateway failure, not a hang.
        let result = match tokio::time::timeout(self.ledger_timeout, self.dispatch(&snapshot)).await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(transaction_id = %transaction_id, "Ledger gateway error: {}", e);
                GatewayResult::failure(e.to_string())
            }
            Err(_) => {
                warn!(transaction_id = %transaction_id, "Ledger gateway timed out");
                GatewayResult::failure("ledger request timed out")
            }
        };

        let finalized = {
            let mut transactions = self.transactions.write().await;
            let transaction = transactions
                .get_mut(&transaction_id)
                .ok_or(ConciergeError::TransactionNotFound(transaction_id))?;

            if result.ok {
                transaction.state = TransactionState::Completed;
                transaction.completed_at = Some(Utc::now());
                transaction.reference = result.reference.clone();
            } else {
                transaction.state = TransactionState::Failed;
                transaction.error =
                    Some(result.error.clone().unwrap_or_else(|| "Unknown error".to_string()));
            }

            transaction.clone()
        };

        // Cleared on failure as well: a failed transaction must not keep
        // the session blocked on "pending".
        if session.active_transaction_id == Some(transaction_id) {
            session.active_transaction_id = None;
        }

        if finalized.state == TransactionState::Completed {
            info!(
                transaction_id = %transaction_id,
                reference = ?finalized.reference,
                "Transaction completed"
            );
            self.audit.record(AuditRecord::transaction(&finalized, "success"));

            Ok(ExecutionOutcome {
                success: true,
                message: response::success_message(&finalized),
                reference: finalized.reference.clone(),
                transaction_id,
            })
        } else {
            self.audit.record(AuditRecord::transaction(&finalized, "failed"));

            Ok(ExecutionOutcome {
                success: false,
                message: response::gateway_failure_message(),
                reference: None,
                transaction_id,
            })
        }
    }

    /// Cancel a transaction awaiting confirmation
    pub async fn cancel(
        &self,
        transaction_id: Uuid,
        session: &mut ConversationSession,
    ) -> Result<String> {
        let cancelled = {
            let mut transactions = self.transactions.write().await;
            let transaction = transactions
                .get_mut(&transaction_id)
                .ok_or(ConciergeError::TransactionNotFound(transaction_id))?;

            if transaction.state != TransactionState::PendingConfirmation {
                return Err(ConciergeError::IllegalState(format!(
                    "cannot cancel a transaction in state {:?}",
                    transaction.state
                )));
            }

            transaction.state = TransactionState::Failed;
            transaction.error = Some("cancelled by user".to_string());
            transaction.clone()
        };

        if session.active_transaction_id == Some(transaction_id) {
            session.active_transaction_id = None;
        }

        info!(transaction_id = %transaction_id, "Transaction cancelled");
        self.audit.record(AuditRecord::transaction(&cancelled, "cancelled"));

        Ok("This transaction has been cancelled. Nothing was processed.".to_string())
    }

    /// Re-entry point for the card-disambiguation path.
    ///
    /// The transaction that asked for clarification is already terminal, so
    /// the chosen card drives a fresh transaction through the same
    /// validation, fraud and confirmation gates.
    pub async fn resume_with_clarification(
        &self,
        transaction_id: Uuid,
        choice: &str,
        auth: &AuthContext,
        session: &mut ConversationSession,
    ) -> Result<WorkflowReply> {
        let original = self
            .get(transaction_id)
            .await
            .ok_or(ConciergeError::TransactionNotFound(transaction_id))?;

        if original.user_id != auth.user_id {
            return Err(ConciergeError::IllegalState(
                "transaction belongs to a different user".to_string(),
            ));
        }

        if !original.params.needs_clarification {
            return Err(ConciergeError::InvalidInput(
                "transaction did not ask for clarification".to_string(),
            ));
        }

        let choice_normalized = choice.trim().to_lowercase();
        let card = original
            .params
            .available_cards
            .iter()
            .find(|card| {
                card.id.to_lowercase() == choice_normalized
                    || card.last_four == choice_normalized
            })
            .cloned()
            .ok_or_else(|| {
                ConciergeError::InvalidInput(format!(
                    "no card matching '{}' was offered",
                    choice
                ))
            })?;

        let replacement = Transaction::new(original.kind, &auth.user_id);
        let replacement_id = replacement.id;
        self.transactions
            .write()
            .await
            .insert(replacement_id, replacement);

        info!(
            transaction_id = %replacement_id,
            resumed_from = %transaction_id,
            card_id = %card.id,
            "Clarified transaction initiated"
        );

        let params = TransactionParams {
            card_id: Some(card.id),
            ..TransactionParams::default()
        };

        self.update(replacement_id, |tx| tx.params = params.clone())
            .await?;

        match self
            .gate_and_confirm(replacement_id, original.kind, params, auth, session)
            .await
        {
            Ok(reply) => Ok(reply),
            Err(e) => {
                error!(
                    transaction_id = %replacement_id,
                    "Clarified initiation failed: {}",
                    e
                );
                self.force_failed(replacement_id, "internal error during initiation")
                    .await;
                Ok(WorkflowReply::failure(
                    "Unable to initiate transaction. Please try again.",
                ))
            }
        }
    }

    //
    // ================= Accessors =================
    //

    pub async fn get(&self, transaction_id: Uuid) -> Option<Transaction> {
        self.transactions.read().await.get(&transaction_id).cloned()
    }

    pub async fn state_of(&self, transaction_id: Uuid) -> Option<TransactionState> {
        self.transactions
            .read()
            .await
            .get(&transaction_id)
            .map(|tx| tx.state)
    }

    pub async fn transaction_count(&self) -> usize {
        self.transactions.read().await.len()
    }

    //
    // ================= Internals =================
    //

    async fn drive_initiate(
        &self,
        transaction_id: Uuid,
        kind: TransactionType,
        message: &str,
        auth: &AuthContext,
        session: &mut ConversationSession,
    ) -> Result<WorkflowReply> {
        let params = self.extract_parameters(kind, message, auth).await?;
        self.update(transaction_id, |tx| tx.params = params.clone())
            .await?;

        self.gate_and_confirm(transaction_id, kind, params, auth, session)
            .await
    }

    /// Validation, fraud scoring and the confirmation gate, in that order.
    /// Shared by `initiate` and the clarification re-entry path.
    async fn gate_and_confirm(
        &self,
        transaction_id: Uuid,
        kind: TransactionType,
        params: TransactionParams,
        auth: &AuthContext,
        session: &mut ConversationSession,
    ) -> Result<WorkflowReply> {
        let outcome = self.validator.validate(kind, &params, auth);
        if !outcome.valid {
            let validation_error = outcome
                .error
                .unwrap_or_else(|| "validation failed".to_string());
            self.transition(
                transaction_id,
                TransactionState::Failed,
                Some(validation_error.clone()),
            )
            .await?;

            // No fraud check runs on invalid transactions.
            if params.needs_clarification {
                let mut reply = WorkflowReply::failure(response::clarification_prompt(&params));
                reply.transaction_id = Some(transaction_id);
                reply.metadata = json!({
                    "needs_clarification": true,
                    "available_cards": params.available_cards,
                });
                return Ok(reply);
            }

            return Ok(WorkflowReply::failure(format!(
                "Unable to process: {}",
                validation_error
            )));
        }

        self.transition(transaction_id, TransactionState::Validated, None)
            .await?;

        let snapshot = self
            .get(transaction_id)
            .await
            .ok_or(ConciergeError::TransactionNotFound(transaction_id))?;
        let assessment = self.fraud.check(&snapshot).await;

        if assessment.is_suspicious {
            self.transition(
                transaction_id,
                TransactionState::Failed,
                Some(SUSPICIOUS_ACTIVITY_ERROR.to_string()),
            )
            .await?;

            // Detection reasons go to the security-alert record only; the
            // user-facing reply stays generic.
            self.audit.record(AuditRecord::security_alert(
                &auth.user_id,
                transaction_id,
                &assessment.reasons.join("; "),
            ));

            return Ok(WorkflowReply::blocked(
                "This transaction has been flagged for review. Please contact \
                 customer support.",
            ));
        }

        self.transition(transaction_id, TransactionState::PendingConfirmation, None)
            .await?;
        session.active_transaction_id = Some(transaction_id);

        Ok(WorkflowReply {
            message: response::confirmation_message(kind, &params),
            requires_confirmation: true,
            transaction_id: Some(transaction_id),
            blocked: false,
            error: false,
            metadata: json!({
                "type": kind.to_string(),
                "params": params,
            }),
        })
    }

    async fn dispatch(&self, transaction: &Transaction) -> Result<GatewayResult> {
        let params = &transaction.params;

        match transaction.kind {
            TransactionType::LockCard => {
                self.ledger
                    .lock_card(
                        &transaction.user_id,
                        params.card_id.as_deref().unwrap_or_default(),
                    )
                    .await
            }
            TransactionType::UnlockCard => {
                self.ledger
                    .unlock_card(
                        &transaction.user_id,
                        params.card_id.as_deref().unwrap_or_default(),
                    )
                    .await
            }
            TransactionType::TransferFunds => {
                self.ledger
                    .transfer_funds(
                        &transaction.user_id,
                        params.amount.unwrap_or(0.0),
                        params.from_account.as_deref().unwrap_or_default(),
                        params.to_account.as_deref().unwrap_or_default(),
                    )
                    .await
            }
            TransactionType::PayBill | TransactionType::UpdateLimits => Ok(
                GatewayResult::failure("operation not supported by the ledger gateway yet"),
            ),
        }
    }

    async fn extract_parameters(
        &self,
        kind: TransactionType,
        message: &str,
        auth: &AuthContext,
    ) -> Result<TransactionParams> {
        let entities = extract_entities(message);

        match kind {
            TransactionType::LockCard | TransactionType::UnlockCard => {
                let cards = self.ledger.get_cards(&auth.user_id).await?;
                Ok(card_params(cards, entities.card_last_four.as_deref()))
            }
            TransactionType::TransferFunds => Ok(transfer_params(message, &entities)),
            TransactionType::PayBill => Ok(bill_params(message, &entities)),
            TransactionType::UpdateLimits => Ok(TransactionParams {
                amount: entities.amount,
                ..TransactionParams::default()
            }),
        }
    }

    /// Guarded state transition; refuses anything outside the legal edges.
    async fn transition(
        &self,
        transaction_id: Uuid,
        next: TransactionState,
        failure_error: Option<String>,
    ) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(&transaction_id)
            .ok_or(ConciergeError::TransactionNotFound(transaction_id))?;

        if !transaction.state.can_transition_to(next) {
            return Err(ConciergeError::IllegalState(format!(
                "{:?} -> {:?} is not a legal transition",
                transaction.state, next
            )));
        }

        debug!(
            transaction_id = %transaction_id,
            from = ?transaction.state,
            to = ?next,
            "State transition"
        );

        transaction.state = next;
        if next == TransactionState::Failed {
            transaction.error = failure_error;
        }

        Ok(())
    }

    /// Last-resort terminal transition; used when an internal error would
    /// otherwise abandon a transaction mid-flight.
    async fn force_failed(&self, transaction_id: Uuid, reason: &str) {
        let mut transactions = self.transactions.write().await;
        if let Some(transaction) = transactions.get_mut(&transaction_id) {
            if !transaction.state.is_terminal() {
                transaction.state = TransactionState::Failed;
                transaction.error = Some(reason.to_string());
            }
        }
    }

    async fn update<F: FnOnce(&mut Transaction)>(
        &self,
        transaction_id: Uuid,
        apply: F,
    ) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(&transaction_id)
            .ok_or(ConciergeError::TransactionNotFound(transaction_id))?;
        apply(transaction);
        Ok(())
    }
}

//
// ================= Parameter Extraction =================
//

lazy_static! {
    static ref BILL_PAYEE_RE: Regex =
        Regex::new(r"(?i)pay\s+(?:my\s+)?([a-z][a-z ]*?)\s+bill").unwrap();
}

fn card_params(cards: Vec<Card>, last_four: Option<&str>) -> TransactionParams {
    if let Some(last_four) = last_four {
        if let Some(card) = cards.iter().find(|card| card.last_four == last_four) {
            return TransactionParams {
                card_id: Some(card.id.clone()),
                ..TransactionParams::default()
            };
        }
    }

    match cards.len() {
        // No card on file: validation rejects downstream.
        0 => TransactionParams::default(),
        1 => TransactionParams {
            card_id: Some(cards[0].id.clone()),
            ..TransactionParams::default()
        },
        // Several cards and nothing to disambiguate: ask, don't guess.
        _ => TransactionParams {
            needs_clarification: true,
            available_cards: cards,
            ..TransactionParams::default()
        },
    }
}

fn transfer_params(message: &str, entities: &Entities) -> TransactionParams {
    let msg_lower = message.to_lowercase();

    TransactionParams {
        amount: entities.amount,
        from_account: account_after(&msg_lower, "from "),
        to_account: account_after(&msg_lower, "to "),
        ..TransactionParams::default()
    }
}

/// Earliest known account type mentioned after the marker
fn account_after(msg_lower: &str, marker: &str) -> Option<String> {
    let idx = msg_lower.find(marker)?;
    let rest = &msg_lower[idx + marker.len()..];

    ACCOUNT_TYPES
        .iter()
        .filter_map(|acc| rest.find(*acc).map(|pos| (pos, *acc)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, acc)| acc.to_string())
}

fn bill_params(message: &str, entities: &Entities) -> TransactionParams {
    let payee = BILL_PAYEE_RE
        .captures(message)
        .map(|caps| caps[1].trim().to_string())
        .or_else(|| {
            let msg_lower = message.to_lowercase();
            msg_lower.find(" to ").and_then(|idx| {
                let payee = message[idx + 4..]
                    .trim()
                    .trim_end_matches(&['.', '!', '?'][..])
                    .to_string();
                (!payee.is_empty()).then_some(payee)
            })
        });

    TransactionParams {
        amount: entities.amount,
        payee,
        ..TransactionParams::default()
    }
}
