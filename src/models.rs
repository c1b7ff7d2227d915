//! Core data models for the banking concierge

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// Transaction workflow states
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Initiated,
    Validated,
    PendingConfirmation,
    Executing,
    Completed,
    Failed,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Completed | TransactionState::Failed)
    }

    /// Legal forward edges of the state machine. Exhaustive so that adding a
    /// state forces every transition site to be revisited.
    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        use TransactionState::*;
        match self {
            Initiated => matches!(next, Validated | Failed),
            Validated => matches!(next, PendingConfirmation | Failed),
            PendingConfirmation => matches!(next, Executing | Failed),
            Executing => matches!(next, Completed | Failed),
            Completed => false,
            Failed => false,
        }
    }
}

/// Supported transaction kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    LockCard,
    UnlockCard,
    TransferFunds,
    PayBill,
    UpdateLimits,
}

/// Classified purpose of a user message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Faq,
    CheckBalance,
    TransactionHistory,
    TransferFunds,
    UnlockCard,
    LockCard,
    PayBill,
    GeneralQuery,
}

impl Intent {
    /// All intents, in declaration order. Used for the delegate prompt and
    /// as the deterministic tie-break order for keyword scoring.
    pub const ALL: [Intent; 8] = [
        Intent::Faq,
        Intent::CheckBalance,
        Intent::TransactionHistory,
        Intent::TransferFunds,
        Intent::UnlockCard,
        Intent::LockCard,
        Intent::PayBill,
        Intent::GeneralQuery,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Intent::Faq => "faq",
            Intent::CheckBalance => "check_balance",
            Intent::TransactionHistory => "transaction_history",
            Intent::TransferFunds => "transfer_funds",
            Intent::UnlockCard => "unlock_card",
            Intent::LockCard => "lock_card",
            Intent::PayBill => "pay_bill",
            Intent::GeneralQuery => "general_query",
        }
    }

    pub fn from_label(label: &str) -> Option<Intent> {
        Intent::ALL.iter().copied().find(|i| i.label() == label)
    }

    /// Transaction kind for transactional intents
    pub fn transaction_type(&self) -> Option<TransactionType> {
        match self {
            Intent::TransferFunds => Some(TransactionType::TransferFunds),
            Intent::UnlockCard => Some(TransactionType::UnlockCard),
            Intent::LockCard => Some(TransactionType::LockCard),
            Intent::PayBill => Some(TransactionType::PayBill),
            _ => None,
        }
    }
}

/// How an intent classification was produced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntentMethod {
    Llm,
    Keyword,
    Default,
}

/// Role of a message sender within a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

//
// ================= Authentication =================
//

/// Verified caller identity, produced by the `Authenticator` collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
    pub authenticated: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.authenticated && now < self.expires_at
    }
}

//
// ================= Intent Classification =================
//

/// Entities pulled from a message, intent-agnostic
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Entities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last_four: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_reference: Option<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.card_last_four.is_none()
            && self.account_type.is_none()
            && self.date_reference.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: Entities,
    pub method: IntentMethod,
}

/// Snapshot of session state handed to classification
#[derive(Debug, Clone, Default)]
pub struct SessionContextView {
    pub last_intent: Option<Intent>,
    pub transaction_state: Option<TransactionState>,
    pub message_count: usize,
    pub elapsed_seconds: i64,
}

//
// ================= Ledger Data =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub number: String,
    pub account_type: String,
    pub balance: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub card_type: String,
    pub last_four: String,
    pub status: String,
}

/// Result of a side-effecting ledger operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayResult {
    pub fn success(reference: impl Into<String>) -> Self {
        Self {
            ok: true,
            reference: Some(reference.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            reference: None,
            error: Some(error.into()),
        }
    }
}

//
// ================= Transaction =================
//

/// Kind-specific transaction parameters, populated once during initiation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_clarification: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_cards: Vec<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionType,
    pub user_id: String,
    pub state: TransactionState,
    pub params: TransactionParams,
    pub reference: Option<String>,
    pub error: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(kind: TransactionType, user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            user_id: user_id.into(),
            state: TransactionState::Initiated,
            params: TransactionParams::default(),
            reference: None,
            error: None,
            initiated_at: Utc::now(),
            completed_at: None,
        }
    }
}

//
// ================= Fraud =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub is_suspicious: bool,
    pub reasons: Vec<String>,
    pub risk_score: f32,
}

//
// ================= Validation =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

//
// ================= Workflow Replies =================
//

/// Outcome of `TransactionWorkflow::initiate` and the clarification path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReply {
    pub message: String,
    pub requires_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl WorkflowReply {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            requires_confirmation: false,
            transaction_id: None,
            blocked: false,
            error: true,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            requires_confirmation: false,
            transaction_id: None,
            blocked: true,
            error: false,
            metadata: serde_json::Value::Null,
        }
    }
}

/// Outcome of `TransactionWorkflow::execute`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub transaction_id: Uuid,
}

//
// ================= Orchestrator Response =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    pub confidence: f32,
    pub requires_auth: bool,
    pub requires_confirmation: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ChatResponse {
    /// Generic recovery response emitted at the orchestrator boundary
    pub fn apology(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: "I apologize, but I encountered an error processing your request. \
                      Please try again or contact support if the issue persists."
                .to_string(),
            intent: None,
            confidence: 0.0,
            requires_auth: false,
            requires_confirmation: false,
            error: true,
            metadata: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }
}

/// Summary of a live session, for the session-info endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_intent: Option<Intent>,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::LockCard => "lock_card",
            TransactionType::UnlockCard => "unlock_card",
            TransactionType::TransferFunds => "transfer_funds",
            TransactionType::PayBill => "pay_bill",
            TransactionType::UpdateLimits => "update_limits",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_edges() {
        use TransactionState::*;

        assert!(Initiated.can_transition_to(Validated));
        assert!(Initiated.can_transition_to(Failed));
        assert!(Validated.can_transition_to(PendingConfirmation));
        assert!(PendingConfirmation.can_transition_to(Executing));
        assert!(PendingConfirmation.can_transition_to(Failed));
        assert!(Executing.can_transition_to(Completed));
        assert!(Executing.can_transition_to(Failed));

        // No backward edges, no skipping the confirmation gate
        assert!(!Validated.can_transition_to(Initiated));
        assert!(!Validated.can_transition_to(Executing));
        assert!(!Initiated.can_transition_to(Completed));

        // Terminal states are terminal
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Initiated));
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
    }

    #[test]
    fn test_intent_labels_round_trip() {
        for intent in Intent::ALL {
            assert_eq!(Intent::from_label(intent.label()), Some(intent));
        }
        assert_eq!(Intent::from_label("no_such_intent"), None);
    }

    #[test]
    fn test_transactional_intent_mapping() {
        assert_eq!(
            Intent::LockCard.transaction_type(),
            Some(TransactionType::LockCard)
        );
        assert_eq!(
            Intent::TransferFunds.transaction_type(),
            Some(TransactionType::TransferFunds)
        );
        assert_eq!(Intent::Faq.transaction_type(), None);
        assert_eq!(Intent::CheckBalance.transaction_type(), None);
    }
}
