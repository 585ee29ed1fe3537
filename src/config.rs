//! Configuration management for chat-relay
//!
//! Parses TOML configuration files and provides typed access to settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Ceiling on a single upstream call, including the whole streamed body
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Largest accepted chat request body; larger bodies are answered with 413
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

/// Session cookie authentication
///
/// Exactly one resolution mode is used: `session_url` (remote lookup) wins
/// over the static `sessions` table when both are present.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_cookie_names")]
    cookie_names: Vec<String>,
    #[serde(default)]
    session_url: Option<String>,
    #[serde(default)]
    sessions: Vec<StaticSession>,
}

impl AuthConfig {
    /// Cookie names that may carry the session token, in lookup order
    pub fn cookie_names(&self) -> &[String] {
        &self.cookie_names
    }

    /// Remote session endpoint (NextAuth-style `/api/auth/session`)
    pub fn session_url(&self) -> Option<&str> {
        self.session_url.as_deref()
    }

    /// Static token table used when no remote endpoint is configured
    pub fn sessions(&self) -> &[StaticSession] {
        &self.sessions
    }
}

fn default_cookie_names() -> Vec<String> {
    vec![
        "next-auth.session-token".to_string(),
        "__Secure-next-auth.session-token".to_string(),
    ]
}

/// A fixed session token mapped to a user id
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticSession {
    token: String,
    user_id: String,
}

impl StaticSession {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Upstream provider endpoints
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// OpenAI chat-completions endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    base_url: String,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default = "default_openai_key_env")]
    api_key_env: Option<String>,
}

impl OpenAiConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve the API key from the inline value or the named environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: None,
            api_key_env: default_openai_key_env(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

/// Gemini generative-language endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    base_url: String,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default = "default_gemini_key_env")]
    api_key_env: Option<String>,
    /// Send system messages as `systemInstruction` instead of dropping them
    #[serde(default)]
    system_instruction: bool,
}

impl GeminiConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn system_instruction(&self) -> bool {
        self.system_instruction
    }

    /// Resolve the API key from the inline value or the named environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            api_key: None,
            api_key_env: default_gemini_key_env(),
            system_instruction: false,
        }
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_key_env() -> Option<String> {
    Some("GEMINI_API_KEY".to_string())
}

fn resolve_api_key(inline: Option<&str>, env_var: Option<&str>) -> Option<String> {
    if let Some(key) = inline.filter(|k| !k.trim().is_empty()) {
        return Some(key.to_string());
    }
    env_var
        .and_then(|name| std::env::var(name).ok())
        .filter(|k| !k.trim().is_empty())
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            crate::error::AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| crate::error::AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Upstream request timeout as a `Duration`
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.server.request_timeout_seconds)
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()` and `from_str()`, but can
    /// also be called explicitly when constructing Config via `toml::from_str`.
    pub fn validate(&self) -> crate::error::AppResult<()> {
        use crate::error::AppError;

        if self.server.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "request_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.server.request_timeout_seconds > 300 {
            return Err(AppError::Config(format!(
                "request_timeout_seconds cannot exceed 300 seconds (5 minutes), got {}",
                self.server.request_timeout_seconds
            )));
        }

        if self.server.max_body_bytes == 0 {
            return Err(AppError::Config(
                "max_body_bytes must be greater than 0".to_string(),
            ));
        }

        // Auth: cookie names
        if self.auth.cookie_names.is_empty() {
            return Err(AppError::Config(
                "auth.cookie_names must list at least one cookie name".to_string(),
            ));
        }
        if let Some(name) = self
            .auth
            .cookie_names
            .iter()
            .find(|name| name.trim().is_empty() || name.contains(['=', ';']))
        {
            return Err(AppError::Config(format!(
                "auth.cookie_names contains invalid cookie name '{}'",
                name
            )));
        }

        // Auth: a resolution mode must exist
        match &self.auth.session_url {
            Some(url) if !is_http_url(url) => {
                return Err(AppError::Config(format!(
                    "auth.session_url '{}' must start with 'http://' or 'https://'",
                    url
                )));
            }
            Some(_) => {}
            None if self.auth.sessions.is_empty() => {
                return Err(AppError::Config(
                    "auth requires either session_url or at least one [[auth.sessions]] entry"
                        .to_string(),
                ));
            }
            None => {}
        }
        for (index, session) in self.auth.sessions.iter().enumerate() {
            if session.token.trim().is_empty() || session.user_id.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "auth.sessions[{}] must have a non-empty token and user_id",
                    index
                )));
            }
        }

        // Providers
        for (name, base_url) in [
            ("openai", self.providers.openai.base_url()),
            ("gemini", self.providers.gemini.base_url()),
        ] {
            if !is_http_url(base_url) {
                return Err(AppError::Config(format!(
                    "providers.{}.base_url '{}' must start with 'http://' or 'https://'",
                    name, base_url
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.observability.log_level.as_str()) {
            return Err(AppError::Config(format!(
                "observability.log_level '{}' must be one of {:?}",
                self.observability.log_level, LOG_LEVELS
            )));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = crate::error::AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(toml_str).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            }
        })?;

        config.validate()?;
        Ok(config)
    }
}
