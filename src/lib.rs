//! chat-relay - authenticated streaming relay for chat completions
//!
//! A signed-in browser sends its chat history to `POST /api/chat/completions`
//! naming a provider (`openai` or `gemini`) and a model. The relay checks the
//! session cookie, forwards the conversation to the vendor's streaming API
//! and pipes the generated text back as an unframed `text/plain` body.

pub mod auth;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod providers;
pub mod telemetry;
