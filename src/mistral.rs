//! Mistral API client
//!
//! Handles all LLM interactions: FAQ answer generation and delegated intent
//! classification. Uses a long-lived reqwest::Client for connection pooling.

use crate::config::Settings;
use crate::error::ConciergeError;
use crate::retrieval::Passage;
use crate::session::SessionMessage;
use crate::models::MessageRole;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1/chat/completions";

/// How many trailing conversation messages ride along as LLM context
const HISTORY_CONTEXT_WINDOW: usize = 6;

const BANKING_SYSTEM_PROMPT: &str = "\
You are a retail bank's AI assistant, helping customers with banking queries \
and transactions.

Guidelines:
- Security first: never discuss another customer's accounts
- Use simple, jargon-free language and keep answers concise
- Never provide investment advice
- When unsure, offer to hand over to a human agent
- Cite knowledge-base sources when they are provided";

/// Collaborator interface for free-text answer generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, message: &str, context: &GenerationContext<'_>) -> Result<String>;
}

/// Supporting material for a generation call
pub struct GenerationContext<'a> {
    pub passages: &'a [Passage],
    pub history: &'a [SessionMessage],
}

/// Reusable Mistral client (connection-pooled)
pub struct MistralClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl MistralClient {
    pub fn from_settings(settings: &Settings) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key: settings.mistral_api_key.clone(),
            base_url: MISTRAL_API_URL.to_string(),
            model: settings.mistral_model.clone(),
            temperature: settings.mistral_temperature,
            max_tokens: settings.mistral_max_tokens,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// One-shot completion for a single user prompt
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(vec![ApiMessage::user(prompt)]).await
    }

    /// Run a chat completion against the Mistral API
    pub async fn chat(&self, messages: Vec<ApiMessage>) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ConciergeError::LlmError("MISTRAL_API_KEY not configured".to_string())
        })?;

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!(model = %self.model, "Calling Mistral API");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Mistral API request failed: {}", e);
                ConciergeError::LlmError(format!("Mistral API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Mistral API error response: {}", error_text);
            return Err(ConciergeError::LlmError(format!(
                "Mistral API error: {}",
                error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Mistral response: {}", e);
            ConciergeError::LlmError(format!("Mistral parse error: {}", e))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ConciergeError::LlmError("No response from Mistral API".to_string()))
    }
}

#[async_trait]
impl TextGenerator for MistralClient {
    async fn generate(&self, message: &str, context: &GenerationContext<'_>) -> Result<String> {
        let mut messages = vec![ApiMessage::system(BANKING_SYSTEM_PROMPT)];

        let skip = context.history.len().saturating_sub(HISTORY_CONTEXT_WINDOW);
        for msg in &context.history[skip..] {
            let role = match msg.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            };
            messages.push(ApiMessage::new(role, &msg.content));
        }

        if !context.passages.is_empty() {
            messages.push(ApiMessage::system(&format!(
                "Relevant information:\n\n{}",
                format_passages(context.passages)
            )));
        }

        messages.push(ApiMessage::user(message));

        self.chat(messages).await
    }
}

fn format_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] {}\n(Source: {})", i + 1, p.content, p.source))
        .collect::<Vec<_>>()
        .join("\n\n")
}

//
// ================= Wire Types =================
//

#[derive(Debug, Clone, Serialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ApiMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    pub fn system(content: &str) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: &str) -> Self {
        Self::new("user", content)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_client_errors() {
        let client = MistralClient::from_settings(&Settings::default());
        assert!(!client.is_configured());

        let result = client.complete("what is a savings account?").await;
        assert!(result.is_err());
        let message = result.unwrap_err().to_string();
        assert!(message.to_lowercase().contains("not configured"));
    }

    #[test]
    fn test_format_passages() {
        let passages = vec![
            Passage {
                content: "Branches open 9:30am.".to_string(),
                source: "branch-hours".to_string(),
                score: 0.9,
            },
            Passage {
                content: "ATMs run 24/7.".to_string(),
                source: "atm".to_string(),
                score: 0.5,
            },
        ];

        let formatted = format_passages(&passages);
        assert!(formatted.contains("[1] Branches open 9:30am."));
        assert!(formatted.contains("(Source: atm)"));
    }
}
