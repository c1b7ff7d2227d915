//! Conversation sessions and the session store
//!
//! One `ConversationSession` per ongoing conversation, held behind a
//! per-session mutex so operations on the same session serialize while
//! different sessions never block each other.

use crate::models::{AuthContext, Intent, MessageRole, SessionContextView, SessionInfo, TransactionState};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// A single message in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state of one conversation
#[derive(Debug)]
pub struct ConversationSession {
    pub id: String,
    messages: Vec<SessionMessage>,
    pub auth: Option<AuthContext>,
    pub last_intent: Option<Intent>,
    pub active_transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>, auth: Option<AuthContext>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            auth,
            last_intent: None,
            active_transaction_id: None,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Append a message and bump the activity timestamp
    pub fn add_message(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(SessionMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        self.last_activity_at = Utc::now();
        debug!(session_id = %self.id, ?role, "Message appended");
    }

    /// Trailing window of the history; the full log is append-only and
    /// consumers are expected to ask for bounded windows only.
    pub fn history(&self, last_n: usize) -> &[SessionMessage] {
        let skip = self.messages.len().saturating_sub(last_n);
        &self.messages[skip..]
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Context snapshot for intent classification. The caller supplies the
    /// active transaction's state since the workflow owns transactions.
    pub fn context_view(&self, transaction_state: Option<TransactionState>) -> SessionContextView {
        SessionContextView {
            last_intent: self.last_intent,
            transaction_state,
            message_count: self.messages.len(),
            elapsed_seconds: (Utc::now() - self.created_at).num_seconds(),
        }
    }

    /// Pure expiry predicate; nothing in the store enforces it
    pub fn is_expired(&self, timeout_minutes: i64) -> bool {
        Utc::now() - self.last_activity_at > Duration::minutes(timeout_minutes)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            message_count: self.messages.len(),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            last_intent: self.last_intent,
        }
    }
}

pub type SessionHandle = Arc<Mutex<ConversationSession>>;

/// Keyed lifecycle manager for sessions
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    timeout_minutes: i64,
}

impl SessionStore {
    pub fn new(timeout_minutes: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout_minutes,
        }
    }

    /// Look up a session, minting a fresh id and session when the id is
    /// absent or unknown.
    pub async fn get_or_create(
        &self,
        id: Option<&str>,
        auth: Option<AuthContext>,
    ) -> (String, SessionHandle) {
        if let Some(id) = id {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(id) {
                return (id.to_string(), handle.clone());
            }
        }

        let new_id = Uuid::new_v4().to_string();
        let handle = Arc::new(Mutex::new(ConversationSession::new(new_id.clone(), auth)));

        let mut sessions = self.sessions.write().await;
        sessions.insert(new_id.clone(), handle.clone());
        debug!(session_id = %new_id, "Session created");

        (new_id, handle)
    }

    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session_id = %id, "Session cleared");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle past the configured timeout. Advisory
    /// housekeeping for callers to schedule; never invoked implicitly.
    pub async fn sweep_expired(&self) -> usize {
        let mut expired = Vec::new();

        {
            let sessions = self.sessions.read().await;
            for (id, handle) in sessions.iter() {
                if let Ok(session) = handle.try_lock() {
                    if session.is_expired(self.timeout_minutes) {
                        expired.push(id.clone());
                    }
                }
            }
        }

        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for id in expired {
            if sessions.remove(&id).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "Expired sessions swept");
        }
        removed
    }
}
