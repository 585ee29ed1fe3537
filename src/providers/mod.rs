//! Upstream chat-completion providers
//!
//! Every provider implements [`ChatProvider`]: given a model name and the
//! caller's messages it starts a streaming call and returns a [`TextStream`]
//! of plain text fragments. [`Providers`] holds one client per
//! [`ModelProvider`] variant; it is built once at startup and injected into
//! the handler state.

use crate::chat::ChatMessage;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub mod gemini;
pub mod openai;
pub mod turns;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Incremental text output of a provider
///
/// Items are non-empty UTF-8 fragments. An `Err` item ends the stream.
pub type TextStream = BoxStream<'static, AppResult<Bytes>>;

/// Provider discriminator, parsed from the `modelProvider` request field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelProvider {
    OpenAi,
    Gemini,
}

impl ModelProvider {
    /// Wire name, also used as the metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "openai",
            ModelProvider::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown model provider '{0}'")]
pub struct UnknownProvider(pub String);

impl FromStr for ModelProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ModelProvider::OpenAi),
            "gemini" => Ok(ModelProvider::Gemini),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// A hosted chat-completion API that can stream text
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Start a streaming completion
    ///
    /// Errors returned here happen before any output exists (transport
    /// failure, non-2xx status) and become JSON error responses. Failures
    /// after the stream has started are yielded as `Err` items.
    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> AppResult<TextStream>;
}

/// One client per provider, constructed once and shared by all requests
#[derive(Clone)]
pub struct Providers {
    openai: Arc<dyn ChatProvider>,
    gemini: Arc<dyn ChatProvider>,
}

impl Providers {
    pub fn new(openai: Arc<dyn ChatProvider>, gemini: Arc<dyn ChatProvider>) -> Self {
        Self { openai, gemini }
    }

    /// Build the HTTP-backed clients described by the configuration
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        let openai_config = &config.providers.openai;
        let openai_key = openai_config.resolve_api_key();
        if openai_key.is_none() {
            tracing::warn!("No OpenAI API key configured; openai requests will be rejected upstream");
        }

        let gemini_config = &config.providers.gemini;
        let gemini_key = gemini_config.resolve_api_key();
        if gemini_key.is_none() {
            tracing::warn!("No Gemini API key configured; gemini requests will be rejected upstream");
        }

        Self {
            openai: Arc::new(OpenAiProvider::new(
                http.clone(),
                openai_config.base_url(),
                openai_key,
            )),
            gemini: Arc::new(
                GeminiProvider::new(http, gemini_config.base_url(), gemini_key)
                    .with_system_instruction(gemini_config.system_instruction()),
            ),
        }
    }

    /// Client for the given provider
    pub fn get(&self, provider: ModelProvider) -> &dyn ChatProvider {
        match provider {
            ModelProvider::OpenAi => self.openai.as_ref(),
            ModelProvider::Gemini => self.gemini.as_ref(),
        }
    }
}

/// Turns one SSE `data:` payload into an optional text fragment
///
/// `Err` carries the reason the stream must stop.
pub(crate) type ExtractFn = fn(&str) -> Result<Option<String>, String>;

type EventResult =
    Result<eventsource_stream::Event, eventsource_stream::EventStreamError<reqwest::Error>>;

struct RelayState {
    events: BoxStream<'static, EventResult>,
    bytes_relayed: usize,
    finished: bool,
}

/// Relay the text carried by an upstream SSE response
///
/// Fragments are yielded as soon as their event is parsed. `data: [DONE]`
/// or the end of the body closes the stream; a transport error or a payload
/// rejected by `extract` yields a single `StreamInterrupted` and then ends.
pub(crate) fn relay_events(
    provider: ModelProvider,
    response: reqwest::Response,
    extract: ExtractFn,
) -> TextStream {
    let state = RelayState {
        events: response.bytes_stream().eventsource().boxed(),
        bytes_relayed: 0,
        finished: false,
    };

    stream::unfold(state, move |mut state| async move {
        if state.finished {
            return None;
        }

        while let Some(event) = state.events.next().await {
            let reason = match event {
                Ok(event) => {
                    let data = event.data.trim();
                    if data == "[DONE]" {
                        return None;
                    }
                    if data.is_empty() {
                        continue;
                    }
                    match extract(data) {
                        Ok(Some(text)) if !text.is_empty() => {
                            state.bytes_relayed += text.len();
                            return Some((Ok(Bytes::from(text)), state));
                        }
                        Ok(_) => continue,
                        Err(reason) => reason,
                    }
                }
                Err(e) => e.to_string(),
            };

            state.finished = true;
            let error = AppError::StreamInterrupted {
                provider: provider.as_str(),
                bytes_relayed: state.bytes_relayed,
                reason,
            };
            return Some((Err(error), state));
        }

        None
    })
    .boxed()
}

/// Convert a non-2xx upstream response into `AppError::Upstream`
///
/// Both vendors wrap failures as `{"error": {"message": ..., ...}}`; OpenAI
/// puts a string `code` there, Gemini a numeric `code` plus a string `status`.
pub(crate) async fn upstream_error(provider: ModelProvider, response: reqwest::Response) -> AppError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let (message, code) = parse_error_body(&text).unwrap_or_else(|| {
        (
            format!("{} request failed with status {}", provider, status),
            None,
        )
    });

    AppError::Upstream {
        provider: provider.as_str(),
        status,
        message,
        code,
    }
}

fn parse_error_body(text: &str) -> Option<(String, Option<String>)> {
    let value: Value = serde_json::from_str(text).ok()?;
    let error = match &value {
        Value::Array(items) => items.first()?.get("error")?,
        other => other.get("error")?,
    };
    let message = error.get("message").and_then(Value::as_str)?.to_string();
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .or_else(|| error.get("status").and_then(Value::as_str))
        .map(str::to_string);
    Some((message, code))
}

/// Message for an upstream call that failed before any response arrived
pub(crate) fn transport_error(provider: ModelProvider, error: reqwest::Error) -> AppError {
    AppError::Internal(format!("{} request failed: {}", provider, error))
}
