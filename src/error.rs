//! Error types for chat-relay
//!
//! All errors implement `IntoResponse` for Axum handlers. Every error body is
//! a JSON object of the form `{"message": "...", "code": "..."}` where `code`
//! is only present when an upstream provider supplied one.

use crate::metrics::FailureKind;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Message returned to callers when the failure detail stays server-side
pub const GENERIC_FAILURE_MESSAGE: &str = "Error processing chat completion";

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid modelProvider")]
    UnsupportedProvider,

    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("{provider} returned {status}: {message}")]
    Upstream {
        provider: &'static str,
        status: StatusCode,
        message: String,
        code: Option<String>,
    },

    #[error("Stream from {provider} interrupted after {bytes_relayed} bytes: {reason}")]
    StreamInterrupted {
        provider: &'static str,
        bytes_relayed: usize,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Failure classification used for metrics labels and log levels
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Unauthorized => FailureKind::Unauthorized,
            Self::Validation(_) | Self::UnsupportedProvider | Self::PayloadTooLarge { .. } => {
                FailureKind::Validation
            }
            Self::Upstream { .. } | Self::StreamInterrupted { .. } => FailureKind::Upstream,
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::Internal(_) => FailureKind::Internal,
        }
    }

    /// Whether this failure originates on the server side (worth an error log)
    pub fn is_server_side(&self) -> bool {
        matches!(
            self.failure_kind(),
            FailureKind::Upstream | FailureKind::Internal
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, code) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), None),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            Self::UnsupportedProvider => (StatusCode::BAD_REQUEST, self.to_string(), None),
            Self::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string(), None),
            Self::Upstream {
                status,
                message,
                code,
                ..
            } => {
                // Only relay statuses that actually describe a failure
                let status = if status.is_client_error() || status.is_server_error() {
                    *status
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, message.clone(), code.clone())
            }
            Self::StreamInterrupted { .. } => (
                StatusCode::BAD_GATEWAY,
                GENERIC_FAILURE_MESSAGE.to_string(),
                None,
            ),
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERIC_FAILURE_MESSAGE.to_string(),
                None,
            ),
        };

        let mut body = serde_json::json!({ "message": message });
        if let Some(code) = code {
            body["code"] = serde_json::Value::String(code);
        }

        (status, Json(body)).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
