pub mod client;
pub mod evaluate;
pub mod screen;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("LLM returned no choices")]
    EmptyResponse,
}

/// Request/response access to a chat model. The reply is the text of the
/// first choice.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, LlmError>;
}
