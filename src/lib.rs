//! Banking Concierge
//!
//! A conversational front-end for banking self-service:
//! - Classifies free-text input into banking intents (LLM-delegated with a
//!   deterministic keyword fallback)
//! - Answers informational queries through retrieval + generation
//! - Drives authenticated transactions through a workflow state machine
//!   gated by validation, fraud scoring and explicit user confirmation
//! - Audits every interaction and transaction outcome
//!
//! MESSAGE FLOW:
//! INPUT → SESSION → CLASSIFY → ROUTE (FAQ / ACCOUNT / TRANSACTION) →
//! CONFIRM → EXECUTE → AUDIT

pub mod api;
pub mod audit;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fraud;
pub mod gateway;
pub mod mistral;
pub mod models;
pub mod orchestrator;
pub mod response;
pub mod retrieval;
pub mod session;
pub mod validator;
pub mod workflow;

pub use error::Result;

// Re-export common types
pub use classifier::{Classifier, IntentClassifier, KeywordClassifier};
pub use models::*;
