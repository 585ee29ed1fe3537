//! Session lookup against the web application's session endpoint
//!
//! Only the session cookies are forwarded; other cookies on the request
//! never leave the relay. The endpoint answers `{"user": {"id": ...}, ...}`
//! for a signed-in caller and `{}` (or `null`) otherwise.

use super::{Session, SessionResolver, session_cookies};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct SessionPayload {
    #[serde(default)]
    user: Option<SessionUser>,
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    #[serde(default)]
    id: Option<Value>,
}

pub struct RemoteSessionResolver {
    http: reqwest::Client,
    session_url: String,
    cookie_names: Vec<String>,
}

impl RemoteSessionResolver {
    pub fn new(http: reqwest::Client, session_url: &str, cookie_names: Vec<String>) -> Self {
        Self {
            http,
            session_url: session_url.to_string(),
            cookie_names,
        }
    }
}

fn user_id_from(payload: Option<SessionPayload>) -> Option<Session> {
    let id = payload?.user?.id?;
    match id {
        Value::String(s) => Session::new(s),
        Value::Number(n) => Session::new(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl SessionResolver for RemoteSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> AppResult<Option<Session>> {
        let cookies = session_cookies(headers, &self.cookie_names);
        if cookies.is_empty() {
            return Ok(None);
        }

        let cookie_header = cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");

        let response = self
            .http
            .get(&self.session_url)
            .header(reqwest::header::COOKIE, cookie_header)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Session lookup failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = %status, "Session endpoint did not return a session");
            return Ok(None);
        }

        match response.json::<Option<SessionPayload>>().await {
            Ok(payload) => Ok(user_id_from(payload)),
            Err(e) => {
                tracing::warn!(error = %e, "Session endpoint returned an unreadable body");
                Ok(None)
            }
        }
    }
}
