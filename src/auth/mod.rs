//! Session cookie authentication
//!
//! The relay never issues sessions; it only asks a [`SessionResolver`] who
//! the caller is. Two resolvers exist:
//!
//! - [`RemoteSessionResolver`] forwards the session cookie to the web app's
//!   session endpoint (NextAuth-style `GET /api/auth/session`);
//! - [`StaticSessionResolver`] looks tokens up in a fixed table from config.

use crate::config::AuthConfig;
use crate::error::AppResult;
use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use std::sync::Arc;

pub mod remote;
pub mod static_sessions;

pub use remote::RemoteSessionResolver;
pub use static_sessions::StaticSessionResolver;

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user_id: String,
}

impl Session {
    /// Build a session; `None` when the user id is empty
    pub fn new(user_id: impl Into<String>) -> Option<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            None
        } else {
            Some(Self { user_id })
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Looks up the caller's session from request headers
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `Ok(None)` means "not signed in"; `Err` means the lookup itself failed
    async fn resolve(&self, headers: &HeaderMap) -> AppResult<Option<Session>>;
}

/// Build the resolver selected by the auth configuration
pub fn resolver_from_config(
    config: &AuthConfig,
    http: reqwest::Client,
) -> Arc<dyn SessionResolver> {
    match config.session_url() {
        Some(url) => {
            tracing::info!(session_url = %url, "Using remote session resolver");
            Arc::new(RemoteSessionResolver::new(
                http,
                url,
                config.cookie_names().to_vec(),
            ))
        }
        None => {
            tracing::info!(
                sessions = config.sessions().len(),
                "Using static session resolver"
            );
            Arc::new(StaticSessionResolver::from_config(config))
        }
    }
}

/// All `name=value` pairs from the request's `Cookie` headers
///
/// A value wrapped in double quotes (RFC 6265 `cookie-value`) is returned
/// without them.
pub fn request_cookies(headers: &HeaderMap) -> impl Iterator<Item = (&str, &str)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.trim(), unquote(value.trim())))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Session cookies present on the request, in the order of `cookie_names`
pub fn session_cookies<'a>(
    headers: &'a HeaderMap,
    cookie_names: &'a [String],
) -> Vec<(&'a str, &'a str)> {
    cookie_names
        .iter()
        .filter_map(|wanted| {
            request_cookies(headers)
                .find(|(name, value)| *name == wanted.as_str() && !value.is_empty())
        })
        .collect()
}
