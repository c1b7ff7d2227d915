//! Error types for the banking concierge

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for concierge operations
pub type Result<T> = std::result::Result<T, ConciergeError>;

#[derive(Error, Debug)]
pub enum ConciergeError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Classification error: {0}")]
    ClassificationError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Transaction blocked: {0}")]
    FraudBlocked(String),

    #[error("Ledger gateway error: {0}")]
    GatewayFailure(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    #[error("Invalid transaction state: {0}")]
    IllegalState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Retrieval error: {0}")]
    RetrievalError(String),

    #[error("Audit error: {0}")]
    AuditError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
