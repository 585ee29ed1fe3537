//! Fixed token table, for local development and tests

use super::{Session, SessionResolver, session_cookies};
use crate::config::AuthConfig;
use crate::error::AppResult;
use async_trait::async_trait;
use axum::http::HeaderMap;
use std::collections::HashMap;

pub struct StaticSessionResolver {
    cookie_names: Vec<String>,
    users_by_token: HashMap<String, String>,
}

impl StaticSessionResolver {
    pub fn new(
        cookie_names: Vec<String>,
        sessions: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            cookie_names,
            users_by_token: sessions.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.cookie_names().to_vec(),
            config
                .sessions()
                .iter()
                .map(|s| (s.token().to_string(), s.user_id().to_string())),
        )
    }
}

#[async_trait]
impl SessionResolver for StaticSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> AppResult<Option<Session>> {
        Ok(session_cookies(headers, &self.cookie_names)
            .into_iter()
            .find_map(|(_, token)| self.users_by_token.get(token))
            .and_then(|user_id| Session::new(user_id.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    fn resolver() -> StaticSessionResolver {
        StaticSessionResolver::new(
            vec!["next-auth.session-token".to_string()],
            [("tok-1".to_string(), "user-1".to_string())],
        )
    }

    fn cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_known_token_resolves() {
        let session = resolver()
            .resolve(&cookie("next-auth.session-token=tok-1"))
            .await
            .unwrap();
        assert_eq!(session.unwrap().user_id(), "user-1");
    }

    #[tokio::test]
    async fn test_unknown_token_is_anonymous() {
        let session = resolver()
            .resolve(&cookie("next-auth.session-token=forged"))
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_token_under_other_cookie_name_is_ignored() {
        let session = resolver().resolve(&cookie("session=tok-1")).await.unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_no_cookie_header() {
        let session = resolver().resolve(&HeaderMap::new()).await.unwrap();
        assert!(session.is_none());
    }
}
