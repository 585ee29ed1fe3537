//! Chat request types
//!
//! `ChatRequest` can only be obtained through `TryFrom<serde_json::Value>`,
//! which performs field validation in a fixed order so that each failure
//! names the specific missing field.

use crate::error::{AppError, AppResult};
use crate::providers::ModelProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message of the conversation, in OpenAI wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Validated body of `POST /api/chat/completions`
#[derive(Debug, Clone)]
pub struct ChatRequest {
    messages: Vec<ChatMessage>,
    provider: ModelProvider,
    model_name: String,
}

impl ChatRequest {
    /// Conversation to forward, never empty
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Provider selected by `modelProvider`
    pub fn provider(&self) -> ModelProvider {
        self.provider
    }

    /// Upstream model name, passed through verbatim
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn non_empty_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

impl TryFrom<Value> for ChatRequest {
    type Error = AppError;

    fn try_from(body: Value) -> AppResult<Self> {
        let Value::Object(mut body) = body else {
            return Err(AppError::Validation(
                "Request body must be a JSON object".to_string(),
            ));
        };

        let items = match body.remove("messages") {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => return Err(AppError::Validation("Messages are required".to_string())),
        };

        let messages = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<ChatMessage>(item).map_err(|e| {
                    AppError::Validation(format!("Invalid message at index {}: {}", index, e))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let provider = non_empty_string(body.remove("modelProvider"))
            .ok_or_else(|| AppError::Validation("modelProvider is required".to_string()))?;

        let model_name = non_empty_string(body.remove("modelName"))
            .ok_or_else(|| AppError::Validation("modelName is required".to_string()))?;

        let provider = provider
            .parse::<ModelProvider>()
            .map_err(|_| AppError::UnsupportedProvider)?;

        Ok(Self {
            messages,
            provider,
            model_name,
        })
    }
}
