//! OpenAI chat-completions client
//!
//! Forwards the caller's messages unchanged to `POST {base_url}/chat/completions`
//! with `stream: true` and relays `choices[0].delta.content` fragments.

use super::{ChatProvider, ModelProvider, TextStream, relay_events, transport_error, upstream_error};
use crate::chat::ChatMessage;
use crate::error::AppResult;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiProvider {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> AppResult<TextStream> {
        let body = CompletionRequest {
            model,
            messages,
            stream: true,
        };

        let mut request = self.http.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(
            model = %model,
            messages_count = messages.len(),
            "Starting OpenAI streaming completion"
        );

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(ModelProvider::OpenAi, e))?;

        if !response.status().is_success() {
            return Err(upstream_error(ModelProvider::OpenAi, response).await);
        }

        Ok(relay_events(ModelProvider::OpenAi, response, delta_text))
    }
}

/// Extract the text delta from one `chat.completion.chunk` payload
fn delta_text(data: &str) -> Result<Option<String>, String> {
    let chunk: Value =
        serde_json::from_str(data).map_err(|e| format!("malformed completion chunk: {}", e))?;

    if let Some(error) = chunk.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("upstream reported an error");
        return Err(message.to_string());
    }

    Ok(chunk
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_text_extracts_content() {
        let data = r#"{"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(delta_text(data).unwrap().as_deref(), Some("Hel"));
    }

    #[test]
    fn test_delta_text_skips_role_and_finish_chunks() {
        let role = r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":null}}]}"#;
        let finish = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        let usage = r#"{"choices":[],"usage":{"total_tokens":12}}"#;
        assert_eq!(delta_text(role).unwrap(), None);
        assert_eq!(delta_text(finish).unwrap(), None);
        assert_eq!(delta_text(usage).unwrap(), None);
    }

    #[test]
    fn test_delta_text_surfaces_inline_error() {
        let data = r#"{"error":{"message":"The server had an error","type":"server_error"}}"#;
        assert_eq!(delta_text(data).unwrap_err(), "The server had an error");
    }

    #[test]
    fn test_delta_text_rejects_malformed_payload() {
        assert!(delta_text("{not json").is_err());
    }

    #[test]
    fn test_completions_url_trims_trailing_slash() {
        let provider = OpenAiProvider::new(reqwest::Client::new(), "http://localhost:1234/v1/", None);
        assert_eq!(provider.completions_url(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_request_body_forwards_messages_unchanged() {
        let messages = [ChatMessage::system("S"), ChatMessage::user("U")];
        let body = serde_json::to_value(CompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            stream: true,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "S"},
                    {"role": "user", "content": "U"}
                ],
                "stream": true
            })
        );
    }
}
