//! Request extractors

use crate::auth::Session;
use crate::error::AppError;
use crate::handlers::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};

/// The caller's session, resolved from request cookies
///
/// Rejects with `AppError::Unauthorized` when the resolver finds no session.
/// Runs on request parts only, so it completes before the body is touched.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .sessions()
            .resolve(&parts.headers)
            .await?
            .map(AuthSession)
            .ok_or(AppError::Unauthorized)
    }
}
