//! Gemini `streamGenerateContent` client
//!
//! Converts the caller's messages with [`to_gemini_turns`], applies fixed
//! safety thresholds and relays the text of each streamed candidate.

use super::turns::{GeminiTurn, system_instruction, to_gemini_turns};
use super::{ChatProvider, ModelProvider, TextStream, relay_events, transport_error, upstream_error};
use crate::chat::ChatMessage;
use crate::error::AppResult;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// One harm category threshold sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: &'static str,
    pub threshold: &'static str,
}

/// Every request blocks medium-and-above severity in these four categories
pub const SAFETY_SETTINGS: [SafetySetting; 4] = [
    SafetySetting {
        category: "HARM_CATEGORY_HARASSMENT",
        threshold: "BLOCK_MEDIUM_AND_ABOVE",
    },
    SafetySetting {
        category: "HARM_CATEGORY_HATE_SPEECH",
        threshold: "BLOCK_MEDIUM_AND_ABOVE",
    },
    SafetySetting {
        category: "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        threshold: "BLOCK_MEDIUM_AND_ABOVE",
    },
    SafetySetting {
        category: "HARM_CATEGORY_DANGEROUS_CONTENT",
        threshold: "BLOCK_MEDIUM_AND_ABOVE",
    },
];

/// Finish reasons that mean the candidate was withheld
const BLOCKING_FINISH_REASONS: [&str; 5] =
    ["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

#[derive(Serialize)]
struct Instruction {
    parts: [InstructionPart; 1],
}

#[derive(Serialize)]
struct InstructionPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [GeminiTurn],
    safety_settings: &'a [SafetySetting],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Instruction>,
}

pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    system_instruction: bool,
}

impl GeminiProvider {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            system_instruction: false,
        }
    }

    /// Forward system messages as `systemInstruction` instead of dropping them
    pub fn with_system_instruction(mut self, enabled: bool) -> Self {
        self.system_instruction = enabled;
        self
    }

    fn stream_url(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:streamGenerateContent", self.base_url, model)
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> AppResult<TextStream> {
        let history = to_gemini_turns(messages);
        if history.discarded_turns() > 0 {
            tracing::warn!(
                model = %model,
                discarded_turns = history.discarded_turns(),
                "Conversation does not open with a user turn; relaying only the last user message to Gemini"
            );
        }

        let instruction = if self.system_instruction {
            system_instruction(messages).map(|text| Instruction {
                parts: [InstructionPart { text }],
            })
        } else {
            None
        };

        tracing::debug!(
            model = %model,
            turns = history.turns().len(),
            fillers_inserted = history.fillers_inserted(),
            system_instruction = instruction.is_some(),
            "Starting Gemini streaming generation"
        );

        let body = GenerateRequest {
            contents: history.turns(),
            safety_settings: &SAFETY_SETTINGS,
            system_instruction: instruction,
        };

        let mut request = self
            .http
            .post(self.stream_url(model))
            .query(&[("alt", "sse")])
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(ModelProvider::Gemini, e))?;

        if !response.status().is_success() {
            return Err(upstream_error(ModelProvider::Gemini, response).await);
        }

        Ok(relay_events(ModelProvider::Gemini, response, candidate_text))
    }
}

/// Extract the visible text of the first candidate in one streamed response
fn candidate_text(data: &str) -> Result<Option<String>, String> {
    let chunk: Value =
        serde_json::from_str(data).map_err(|e| format!("malformed Gemini chunk: {}", e))?;

    if let Some(error) = chunk.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("upstream reported an error");
        return Err(message.to_string());
    }

    if let Some(reason) = chunk
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(format!("prompt blocked: {}", reason));
    }

    let Some(candidate) = chunk.pointer("/candidates/0") else {
        return Ok(None);
    };

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|part| part.get("thought").and_then(Value::as_bool) != Some(true))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str)
            && BLOCKING_FINISH_REASONS.contains(&reason)
        {
            return Err(format!("response blocked: {}", reason));
        }
        return Ok(None);
    }

    Ok(Some(text))
}
