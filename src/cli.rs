//! Command-line interface for chat-relay
//!
//! Provides argument parsing and subcommand handling for the chat-relay binary.

use clap::{Parser, Subcommand};

/// Authenticated streaming relay for OpenAI and Gemini chat completions
#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(version)]
#[command(about = "Authenticated streaming relay for OpenAI and Gemini chat completions")]
#[command(
    long_about = "chat-relay accepts a chat history from a signed-in browser session, \
    forwards it to OpenAI or Gemini, and streams the generated text back as plain text."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# chat-relay configuration
# ========================

# ─────────────────────────────────────────────────────────────────────────────
# SERVER
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 3000

# Upper bound in seconds for one upstream call, including the streamed body
request_timeout_seconds = 30

# Largest accepted chat request body in bytes; larger bodies get 413
max_body_bytes = 2097152

# ─────────────────────────────────────────────────────────────────────────────
# AUTHENTICATION
# ─────────────────────────────────────────────────────────────────────────────
#
# Requests must carry a session cookie. With `session_url` set, the cookie is
# forwarded to that endpoint and the session is accepted when the JSON reply
# contains `user.id`. Without it, tokens are looked up in [[auth.sessions]].

[auth]
cookie_names = ["next-auth.session-token", "__Secure-next-auth.session-token"]
session_url = "http://127.0.0.1:3001/api/auth/session"

# [[auth.sessions]]
# token = "local-dev-token"
# user_id = "dev-user"

# ─────────────────────────────────────────────────────────────────────────────
# PROVIDERS
# ─────────────────────────────────────────────────────────────────────────────
#
# Keys are read from `api_key` when set, otherwise from the environment
# variable named by `api_key_env`.

[providers.openai]
base_url = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"

[providers.gemini]
base_url = "https://generativelanguage.googleapis.com/v1beta"
api_key_env = "GEMINI_API_KEY"
# Forward system messages as Gemini's systemInstruction instead of dropping them
system_instruction = false

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# trace, debug, info, warn or error (RUST_LOG overrides this)
log_level = "info"
"#
}
