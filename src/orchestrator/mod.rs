//! Conversation orchestrator
//!
//! Top-level coordinator: resolves the session, classifies intent, routes
//! to the FAQ, account-query or transaction handlers, and keeps the session
//! and audit trail current. This is the sole recovery boundary visible to
//! callers; every public operation returns a usable `ChatResponse`.

use crate::audit::{AuditLog, AuditRecord};
use crate::classifier::{DelegatedClassifier, IntentClassifier};
use crate::config::Settings;
use crate::fraud::FraudScorer;
use crate::gateway::{LedgerGateway, MockLedgerGateway};
use crate::mistral::{GenerationContext, MistralClient, TextGenerator};
use crate::models::{
    AuthContext, ChatResponse, Intent, IntentMethod, MessageRole, SessionInfo,
};
use crate::response;
use crate::retrieval::{KeywordRetriever, Retriever};
use crate::session::{ConversationSession, SessionStore};
use crate::validator::TransactionValidator;
use crate::workflow::TransactionWorkflow;
use crate::Result;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Internal handler outcome, assembled into a `ChatResponse` by `handle`
struct HandlerReply {
    message: String,
    requires_auth: bool,
    requires_confirmation: bool,
    error: bool,
    metadata: serde_json::Value,
}

impl HandlerReply {
    fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            requires_auth: false,
            requires_confirmation: false,
            error: false,
            metadata: serde_json::Value::Null,
        }
    }

    fn auth_required(message: impl Into<String>) -> Self {
        Self {
            requires_auth: true,
            ..Self::text(message)
        }
    }
}

pub struct Orchestrator {
    sessions: SessionStore,
    classifier: IntentClassifier,
    workflow: TransactionWorkflow,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn TextGenerator>,
    ledger: Arc<dyn LedgerGateway>,
    audit: Arc<AuditLog>,
    retrieval_top_k: usize,
    history_window: usize,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: &Settings,
        classifier: IntentClassifier,
        workflow: TransactionWorkflow,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn TextGenerator>,
        ledger: Arc<dyn LedgerGateway>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(settings.session_timeout_minutes),
            classifier,
            workflow,
            retriever,
            generator,
            ledger,
            audit,
            retrieval_top_k: settings.retrieval_top_k,
            history_window: settings.history_window,
        }
    }

    /// Wire the default component set: mock ledger, seeded retriever,
    /// Mistral generation, LLM-delegated classification when an API key is
    /// configured and keyword-only otherwise.
    pub fn from_settings(settings: &Settings) -> Self {
        let audit = Arc::new(AuditLog::from_settings(settings));
        let fraud = Arc::new(FraudScorer::from_settings(settings));
        let ledger: Arc<dyn LedgerGateway> = Arc::new(MockLedgerGateway::new());
        let mistral = Arc::new(MistralClient::from_settings(settings));

        let classifier = if mistral.is_configured() {
            IntentClassifier::with_delegate(Arc::new(DelegatedClassifier::new(mistral.clone())))
        } else {
            IntentClassifier::keyword_only()
        };

        let workflow = TransactionWorkflow::new(
            TransactionValidator::from_settings(settings),
            fraud,
            ledger.clone(),
            audit.clone(),
            settings.ledger_timeout(),
        );

        Self::new(
            settings,
            classifier,
            workflow,
            Arc::new(KeywordRetriever::with_default_knowledge()),
            mistral,
            ledger,
            audit,
        )
    }

    //
    // ================= Main Entry Point =================
    //

    /// Drive one user message through the pipeline. Never propagates a
    /// fault: unexpected errors degrade to a generic apology response.
    pub async fn handle(
        &self,
        message: &str,
        session_id: Option<&str>,
        auth: Option<AuthContext>,
    ) -> ChatResponse {
        match self.process(message, session_id, auth).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error in conversation processing: {}", e);
                let session_id = session_id
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                ChatResponse::apology(session_id)
            }
        }
    }

    async fn process(
        &self,
        message: &str,
        session_id: Option<&str>,
        auth: Option<AuthContext>,
    ) -> Result<ChatResponse> {
        let (session_id, handle) = self.sessions.get_or_create(session_id, auth.clone()).await;
        let mut session = handle.lock().await;

        // A fresh verified token on the request updates the session's
        // authentication context.
        if let Some(auth) = &auth {
            session.auth = Some(auth.clone());
        }

        session.add_message(MessageRole::User, message);

        let transaction_state = match session.active_transaction_id {
            Some(id) => self.workflow.state_of(id).await,
            None => None,
        };
        let context = session.context_view(transaction_state);
        let intent_result = self.classifier.classify(message, &context).await;

        info!(
            intent = %intent_result.intent,
            confidence = intent_result.confidence,
            "Intent classified"
        );

        let effective_auth = valid_auth(auth.as_ref(), &session);

        let reply = match intent_result.intent {
            Intent::Faq | Intent::GeneralQuery
                if intent_result.method != IntentMethod::Default =>
            {
                self.handle_faq(message, &session).await
            }
            Intent::CheckBalance | Intent::TransactionHistory => {
                self.handle_account_query(effective_auth.as_ref()).await
            }
            Intent::TransferFunds | Intent::LockCard | Intent::UnlockCard | Intent::PayBill => {
                self.handle_transaction(
                    intent_result.intent,
                    message,
                    effective_auth.as_ref(),
                    &mut session,
                )
                .await
            }
            // No recognizable signal at all: fixed menu.
            _ => HandlerReply::text(response::fallback_menu()),
        };

        session.add_message(MessageRole::Assistant, reply.message.clone());
        session.last_intent = Some(intent_result.intent);

        // Lengths only; raw content never reaches the audit trail.
        self.audit.record(AuditRecord::interaction(
            &session_id,
            effective_auth.as_ref().map(|a| a.user_id.as_str()),
            intent_result.intent,
            message.len(),
            reply.message.len(),
        ));

        Ok(ChatResponse {
            session_id,
            message: reply.message,
            intent: Some(intent_result.intent),
            confidence: intent_result.confidence,
            requires_auth: reply.requires_auth,
            requires_confirmation: reply.requires_confirmation,
            error: reply.error,
            metadata: reply.metadata,
            timestamp: Utc::now(),
        })
    }

    //
    // ================= Confirmation Lifecycle =================
    //

    /// Execute a transaction the user has confirmed
    pub async fn confirm(
        &self,
        session_id: &str,
        transaction_id: Uuid,
        auth: Option<AuthContext>,
    ) -> ChatResponse {
        let Some(handle) = self.sessions.get(session_id).await else {
            return unable_to_process(session_id);
        };
        let mut session = handle.lock().await;

        let Some(auth) = valid_auth(auth.as_ref(), &session) else {
            return simple_response(
                session_id,
                response::auth_required_for_transaction(),
                true,
                false,
            );
        };

        match self
            .workflow
            .execute(transaction_id, &auth, &mut session)
            .await
        {
            Ok(outcome) => {
                session.add_message(MessageRole::Assistant, outcome.message.clone());

                ChatResponse {
                    session_id: session_id.to_string(),
                    message: outcome.message,
                    intent: session.last_intent,
                    confidence: 1.0,
                    requires_auth: false,
                    requires_confirmation: false,
                    error: !outcome.success,
                    metadata: json!({
                        "transaction_id": outcome.transaction_id,
                        "reference": outcome.reference,
                        "success": outcome.success,
                    }),
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                warn!(
                    transaction_id = %transaction_id,
                    "Transaction execution rejected: {}",
                    e
                );
                unable_to_process(session_id)
            }
        }
    }

    /// Cancel a transaction awaiting confirmation
    pub async fn cancel(
        &self,
        session_id: &str,
        transaction_id: Uuid,
        auth: Option<AuthContext>,
    ) -> ChatResponse {
        let Some(handle) = self.sessions.get(session_id).await else {
            return unable_to_process(session_id);
        };
        let mut session = handle.lock().await;

        if valid_auth(auth.as_ref(), &session).is_none() {
            return simple_response(
                session_id,
                response::auth_required_for_transaction(),
                true,
                false,
            );
        }

        match self.workflow.cancel(transaction_id, &mut session).await {
            Ok(message) => {
                session.add_message(MessageRole::Assistant, message.clone());
                simple_response(session_id, message, false, false)
            }
            Err(e) => {
                warn!(
                    transaction_id = %transaction_id,
                    "Transaction cancel rejected: {}",
                    e
                );
                unable_to_process(session_id)
            }
        }
    }

    /// Resolve a card-disambiguation prompt with the user's choice
    pub async fn clarify(
        &self,
        session_id: &str,
        transaction_id: Uuid,
        choice: &str,
        auth: Option<AuthContext>,
    ) -> ChatResponse {
        let Some(handle) = self.sessions.get(session_id).await else {
            return unable_to_process(session_id);
        };
        let mut session = handle.lock().await;

        let Some(auth) = valid_auth(auth.as_ref(), &session) else {
            return simple_response(
                session_id,
                response::auth_required_for_transaction(),
                true,
                false,
            );
        };

        match self
            .workflow
            .resume_with_clarification(transaction_id, choice, &auth, &mut session)
            .await
        {
            Ok(reply) => {
                session.add_message(MessageRole::Assistant, reply.message.clone());

                let mut metadata = if reply.metadata.is_null() {
                    json!({})
                } else {
                    reply.metadata
                };
                if let Some(id) = reply.transaction_id {
                    metadata["transaction_id"] = json!(id);
                }

                ChatResponse {
                    session_id: session_id.to_string(),
                    message: reply.message,
                    intent: session.last_intent,
                    confidence: 1.0,
                    requires_auth: false,
                    requires_confirmation: reply.requires_confirmation,
                    error: reply.error,
                    metadata,
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                warn!(
                    transaction_id = %transaction_id,
                    "Clarification rejected: {}",
                    e
                );
                unable_to_process(session_id)
            }
        }
    }

    //
    // ================= Session Management =================
    //

    pub async fn session_info(&self, session_id: &str) -> Option<SessionInfo> {
        let handle = self.sessions.get(session_id).await?;
        let session = handle.lock().await;
        Some(session.info())
    }

    pub async fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).await
    }

    /// Advisory housekeeping hook for callers to schedule
    pub async fn sweep_expired_sessions(&self) -> usize {
        self.sessions.sweep_expired().await
    }

    //
    // ================= Branch Handlers =================
    //

    async fn handle_faq(&self, message: &str, session: &ConversationSession) -> HandlerReply {
        let passages = match self.retriever.retrieve(message, self.retrieval_top_k).await {
            Ok(passages) => passages,
            Err(e) => {
                warn!("Retrieval failed: {}", e);
                Vec::new()
            }
        };

        debug!(passage_count = passages.len(), "Retrieved context for FAQ");

        let context = GenerationContext {
            passages: &passages,
            history: session.history(self.history_window),
        };

        match self.generator.generate(message, &context).await {
            Ok(answer) => {
                let sources: Vec<&str> = passages.iter().map(|p| p.source.as_str()).collect();
                HandlerReply {
                    metadata: json!({ "type": "faq", "sources": sources }),
                    ..HandlerReply::text(answer)
                }
            }
            Err(e) => {
                warn!("FAQ generation failed: {}", e);
                HandlerReply::text(response::faq_fallback())
            }
        }
    }

    async fn handle_account_query(&self, auth: Option<&AuthContext>) -> HandlerReply {
        let Some(auth) = auth else {
            return HandlerReply::auth_required(response::auth_required_for_account());
        };

        match self.ledger.get_accounts(&auth.user_id).await {
            Ok(accounts) => HandlerReply::text(response::account_summary(&accounts)),
            Err(e) => {
                error!("Account query error: {}", e);
                HandlerReply {
                    error: true,
                    ..HandlerReply::text(
                        "I'm having trouble retrieving your account information. \
                         Please try again in a moment.",
                    )
                }
            }
        }
    }

    async fn handle_transaction(
        &self,
        intent: Intent,
        message: &str,
        auth: Option<&AuthContext>,
        session: &mut ConversationSession,
    ) -> HandlerReply {
        let Some(auth) = auth else {
            return HandlerReply::auth_required(response::auth_required_for_transaction());
        };

        let Some(kind) = intent.transaction_type() else {
            // Unreachable from `process`, which only routes transactional
            // intents here.
            return HandlerReply::text(response::fallback_menu());
        };

        let reply = self.workflow.initiate(kind, message, auth, session).await;

        let mut metadata = if reply.metadata.is_null() {
            json!({})
        } else {
            reply.metadata
        };
        if let Some(id) = reply.transaction_id {
            metadata["transaction_id"] = json!(id);
        }

        HandlerReply {
            message: reply.message,
            requires_auth: false,
            requires_confirmation: reply.requires_confirmation,
            error: reply.error,
            metadata,
        }
    }
}

/// Pick the auth context for this operation: a valid context from the
/// request wins, else a still-valid context remembered on the session.
fn valid_auth(
    request_auth: Option<&AuthContext>,
    session: &ConversationSession,
) -> Option<AuthContext> {
    let now = Utc::now();

    request_auth
        .filter(|a| a.is_valid(now))
        .or_else(|| session.auth.as_ref().filter(|a| a.is_valid(now)))
        .cloned()
}

fn simple_response(
    session_id: &str,
    message: impl Into<String>,
    requires_auth: bool,
    error: bool,
) -> ChatResponse {
    ChatResponse {
        session_id: session_id.to_string(),
        message: message.into(),
        intent: None,
        confidence: 0.0,
        requires_auth,
        requires_confirmation: false,
        error,
        metadata: serde_json::Value::Null,
        timestamp: Utc::now(),
    }
}

fn unable_to_process(session_id: &str) -> ChatResponse {
    simple_response(
        session_id,
        "I'm unable to process this request. The transaction may have already \
         been completed or cancelled.",
        false,
        true,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::IntentClassifier;
    use crate::models::TransactionState;
    use chrono::Duration;

    fn test_orchestrator() -> Orchestrator {
        let settings = Settings::default();
        let audit = Arc::new(AuditLog::in_memory());
        let fraud = Arc::new(FraudScorer::from_settings(&settings));
        let ledger: Arc<dyn LedgerGateway> = Arc::new(MockLedgerGateway::without_latency());

        let workflow = TransactionWorkflow::new(
            TransactionValidator::from_settings(&settings),
            fraud,
            ledger.clone(),
            audit.clone(),
            settings.ledger_timeout(),
        );

        Orchestrator::new(
            &settings,
            IntentClassifier::keyword_only(),
            workflow,
            Arc::new(KeywordRetriever::with_default_knowledge()),
            Arc::new(MistralClient::from_settings(&settings)),
            ledger,
            audit,
        )
    }

    fn auth_for(user_id: &str) -> AuthContext {
        AuthContext {
            user_id: user_id.to_string(),
            authenticated: true,
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::minutes(30),
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_balance_query_requires_auth() {
        let orchestrator = test_orchestrator();

        let response = orchestrator.handle("What's my balance?", None, None).await;

        assert_eq!(response.intent, Some(Intent::CheckBalance));
        assert!(response.requires_auth);
        assert!(!response.requires_confirmation);
        assert!(!response.error);
        // no transaction was created
        assert_eq!(orchestrator.workflow.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_authenticated_balance_query_lists_accounts() {
        let orchestrator = test_orchestrator();

        let response = orchestrator
            .handle("What's my balance?", None, Some(auth_for("user_001")))
            .await;

        assert!(!response.requires_auth);
        assert!(response.message.contains("Savings"));
        assert!(response.message.contains("Current"));
    }

    #[tokio::test]
    async fn test_lock_card_end_to_end() {
        let orchestrator = test_orchestrator();
        let auth = auth_for("user_002");

        let response = orchestrator
            .handle("lock my card", None, Some(auth.clone()))
            .await;

        assert_eq!(response.intent, Some(Intent::LockCard));
        assert!(response.requires_confirmation);

        let transaction_id: Uuid = serde_json::from_value(
            response.metadata.get("transaction_id").cloned().unwrap(),
        )
        .unwrap();
        assert_eq!(
            orchestrator.workflow.state_of(transaction_id).await,
            Some(TransactionState::PendingConfirmation)
        );

        let confirmed = orchestrator
            .confirm(&response.session_id, transaction_id, Some(auth))
            .await;

        assert!(!confirmed.error);
        assert!(confirmed.metadata.get("reference").is_some());
        assert_eq!(
            orchestrator.workflow.state_of(transaction_id).await,
            Some(TransactionState::Completed)
        );

        // the session is no longer blocked on a pending transaction
        let handle = orchestrator.sessions.get(&response.session_id).await.unwrap();
        assert_eq!(handle.lock().await.active_transaction_id, None);
    }

    #[tokio::test]
    async fn test_unrecognized_message_gets_fallback_menu() {
        let orchestrator = test_orchestrator();

        let response = orchestrator.handle("xyz123", None, None).await;

        assert_eq!(response.intent, Some(Intent::GeneralQuery));
        assert!((response.confidence - 0.50).abs() < 1e-6);
        assert!(response.message.contains("not quite sure"));
    }

    #[tokio::test]
    async fn test_faq_degrades_to_canned_answer_without_llm() {
        let orchestrator = test_orchestrator();

        let response = orchestrator
            .handle("what are your opening hours?", None, None)
            .await;

        assert_eq!(response.intent, Some(Intent::Faq));
        assert!(!response.requires_auth);
        assert!(response.message.contains("general banking questions"));
    }

    #[tokio::test]
    async fn test_session_continuity_and_intent_memory() {
        let orchestrator = test_orchestrator();

        let first = orchestrator.handle("What's my balance?", None, None).await;
        let second = orchestrator
            .handle("and your branch hours?", Some(&first.session_id), None)
            .await;

        assert_eq!(first.session_id, second.session_id);

        let info = orchestrator.session_info(&first.session_id).await.unwrap();
        assert_eq!(info.message_count, 4);
        assert_eq!(info.last_intent, Some(Intent::Faq));
    }

    #[tokio::test]
    async fn test_interaction_audit_records_lengths_not_content() {
        let orchestrator = test_orchestrator();

        let message = "What's my balance?";
        let response = orchestrator.handle(message, None, None).await;

        let records = orchestrator.audit.recent(5);
        let interaction = records
            .iter()
            .find_map(|record| match record {
                AuditRecord::Interaction {
                    intent,
                    message_length,
                    response_length,
                    ..
                } => Some((intent.clone(), *message_length, *response_length)),
                _ => None,
            })
            .expect("interaction audited");

        assert_eq!(interaction.0, "check_balance");
        assert_eq!(interaction.1, message.len());
        assert_eq!(interaction.2, response.message.len());
    }

    #[tokio::test]
    async fn test_expired_auth_is_treated_as_unauthenticated() {
        let orchestrator = test_orchestrator();

        let expired = AuthContext {
            user_id: "user_001".to_string(),
            authenticated: true,
            issued_at: Utc::now() - Duration::minutes(60),
            expires_at: Utc::now() - Duration::minutes(30),
        };

        let response = orchestrator
            .handle("What's my balance?", None, Some(expired))
            .await;

        assert!(response.requires_auth);
    }

    #[tokio::test]
    async fn test_confirm_on_unknown_session_is_rejected_gracefully() {
        let orchestrator = test_orchestrator();

        let response = orchestrator
            .confirm("no-such-session", Uuid::new_v4(), Some(auth_for("user_001")))
            .await;

        assert!(response.error);
        assert!(response.message.contains("unable to process"));
    }

    #[tokio::test]
    async fn test_clarification_flow_through_orchestrator() {
        let orchestrator = test_orchestrator();
        let auth = auth_for("user_001"); // two cards

        let response = orchestrator
            .handle("lock my card", None, Some(auth.clone()))
            .await;

        assert!(response.error);
        let transaction_id: Uuid = serde_json::from_value(
            response.metadata.get("transaction_id").cloned().unwrap(),
        )
        .unwrap();

        let clarified = orchestrator
            .clarify(&response.session_id, transaction_id, "1234", Some(auth))
            .await;

        assert!(clarified.requires_confirmation);
        assert!(!clarified.error);
    }
}
