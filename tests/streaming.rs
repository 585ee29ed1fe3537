//! Integration tests for incremental delivery of provider output
//!
//! A channel-backed provider is injected in place of the HTTP clients so the
//! test controls exactly when each fragment becomes available, and can check
//! that the response body yields it before the next one exists.

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode, header},
};
use chat_relay::{
    auth::StaticSessionResolver,
    chat::ChatMessage,
    config::Config,
    error::{AppError, AppResult},
    handlers::{self, AppState},
    providers::{ChatProvider, ModelProvider, Providers, TextStream},
};
use futures::{StreamExt, stream};
use http_body_util::BodyExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Provider whose output is fed by the test through a channel
struct ChannelProvider {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<AppResult<Bytes>>>>,
    seen: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ChannelProvider {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<AppResult<Bytes>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Arc::new(Self {
            receiver: Mutex::new(Some(rx)),
            seen: Mutex::new(Vec::new()),
        });
        (provider, tx)
    }
}

#[async_trait]
impl ChatProvider for ChannelProvider {
    async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> AppResult<TextStream> {
        self.seen
            .lock()
            .unwrap()
            .push((model.to_string(), messages.to_vec()));

        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| AppError::Internal("stream already taken".to_string()))?;

        Ok(stream::unfold(receiver, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }
}

/// Provider that must never be selected
struct UnusedProvider;

#[async_trait]
impl ChatProvider for UnusedProvider {
    async fn stream_chat(&self, _model: &str, _messages: &[ChatMessage]) -> AppResult<TextStream> {
        panic!("wrong provider dispatched");
    }
}

fn create_test_config() -> Config {
    r#"
[server]
host = "127.0.0.1"
port = 3000

[[auth.sessions]]
token = "valid-token"
user_id = "user-1"
"#
    .parse()
    .expect("should parse test config")
}

fn create_state(openai: Arc<dyn ChatProvider>, gemini: Arc<dyn ChatProvider>) -> AppState {
    let config = Arc::new(create_test_config());
    let sessions = Arc::new(StaticSessionResolver::from_config(&config.auth));
    AppState::from_parts(config, Providers::new(openai, gemini), sessions)
        .expect("should create state")
}

fn chat_request(provider: &str) -> Request<Body> {
    let body = serde_json::json!({
        "messages": [{"role": "user", "content": "Say hello"}],
        "modelProvider": provider,
        "modelName": "test-model"
    });
    Request::builder()
        .method("POST")
        .uri("/api/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, "next-auth.session-token=valid-token")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn next_data(body: &mut Body) -> Option<Bytes> {
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("frame should arrive without waiting for the rest of the stream")?
        .expect("frame should not be an error");
    frame.into_data().ok()
}

#[tokio::test]
async fn test_fragments_are_delivered_as_they_arrive() {
    let (provider, tx) = ChannelProvider::new();
    let app = handlers::router(create_state(provider.clone(), Arc::new(UnusedProvider)));

    tx.send(Ok(Bytes::from("Hel"))).unwrap();
    let response = app.oneshot(chat_request("openai")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    assert_eq!(next_data(&mut body).await.unwrap(), "Hel");

    tx.send(Ok(Bytes::from("lo"))).unwrap();
    assert_eq!(next_data(&mut body).await.unwrap(), "lo");

    drop(tx);
    assert!(next_data(&mut body).await.is_none());

    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "test-model");
    assert_eq!(seen[0].1, vec![ChatMessage::user("Say hello")]);
}

#[tokio::test]
async fn test_dispatches_to_selected_provider() {
    let (provider, tx) = ChannelProvider::new();
    let state = create_state(Arc::new(UnusedProvider), provider.clone());
    let metrics = state.metrics().clone();

    tx.send(Ok(Bytes::from("from gemini"))).unwrap();
    drop(tx);

    let response = handlers::router(state)
        .oneshot(chat_request("gemini"))
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    assert_eq!(&bytes[..], b"from gemini");
    assert_eq!(metrics.requests_count(ModelProvider::Gemini), 1);
    assert_eq!(metrics.requests_count(ModelProvider::OpenAi), 0);
}

#[tokio::test]
async fn test_error_after_text_aborts_body() {
    let (provider, tx) = ChannelProvider::new();
    let state = create_state(provider, Arc::new(UnusedProvider));
    let metrics = state.metrics().clone();

    tx.send(Ok(Bytes::from("partial"))).unwrap();
    tx.send(Err(AppError::StreamInterrupted {
        provider: "openai",
        bytes_relayed: 7,
        reason: "connection reset".to_string(),
    }))
    .unwrap();

    let response = handlers::router(state)
        .oneshot(chat_request("openai"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result = axum::body::to_bytes(response.into_body(), usize::MAX).await;
    assert!(result.is_err());
    assert_eq!(metrics.stream_failures_count(ModelProvider::OpenAi), 1);
}

#[tokio::test]
async fn test_provider_start_failure_is_json_error() {
    let (provider, tx) = ChannelProvider::new();
    drop(tx);
    // First call takes the receiver; the second request fails to start.
    let state = create_state(provider, Arc::new(UnusedProvider));
    let app = handlers::router(state);

    let first = app.clone().oneshot(chat_request("openai")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(chat_request("openai")).await.unwrap();
    assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(second.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "Error processing chat completion");
}
