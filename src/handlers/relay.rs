//! Chat relay endpoint
//!
//! Handles POST /api/chat/completions: authenticate, validate, dispatch to
//! the selected provider, stream its text back as the response body.

use crate::chat::ChatRequest;
use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::handlers::extract::AuthSession;
use crate::middleware::RequestId;
use axum::{
    Extension,
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use http_body_util::LengthLimitError;
use serde_json::Value;

/// POST /api/chat/completions handler
///
/// # Response
///
/// - `200 OK`, `text/plain; charset=utf-8`: provider text, streamed as it is
///   generated. If the provider fails after streaming began, the body ends
///   with an error and the connection is aborted.
/// - `401` when no session resolves, before the body is read.
/// - `413` when the body exceeds `server.max_body_bytes`.
/// - `400` for malformed JSON, missing fields, or an unknown provider.
/// - vendor status (or `500`) when the provider rejects the call.
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    session: Result<AuthSession, AppError>,
    body: Body,
) -> Response {
    match relay(&state, request_id, session, body).await {
        Ok(response) => response,
        Err(error) => {
            state.metrics().record_failure(error.failure_kind());
            if error.is_server_side() {
                tracing::error!(
                    request_id = %request_id,
                    error = %error,
                    "Chat completion failed"
                );
            } else {
                tracing::debug!(
                    request_id = %request_id,
                    error = %error,
                    "Chat completion rejected"
                );
            }
            error.into_response()
        }
    }
}

async fn relay(
    state: &AppState,
    request_id: RequestId,
    session: Result<AuthSession, AppError>,
    body: Body,
) -> AppResult<Response> {
    let AuthSession(session) = session?;

    let limit = state.config().server.max_body_bytes;
    let body = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| body_read_error(e, limit))?;

    let body: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))?;
    let request = ChatRequest::try_from(body)?;
    let provider = request.provider();

    tracing::info!(
        request_id = %request_id,
        user_id = %session.user_id(),
        provider = %provider,
        model = %request.model_name(),
        messages_count = request.messages().len(),
        "Relaying chat completion"
    );
    state.metrics().record_request(provider);

    let stream = state
        .providers()
        .get(provider)
        .stream_chat(request.model_name(), request.messages())
        .await?;

    let metrics = state.metrics().clone();
    let stream = stream.inspect_err(move |error| {
        tracing::error!(
            request_id = %request_id,
            provider = %provider,
            error = %error,
            "Provider stream failed after the response started"
        );
        metrics.record_stream_failure(provider);
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Map a failed body read to 413 when the limit tripped, 400 otherwise
fn body_read_error(error: axum::Error, limit: usize) -> AppError {
    let error = error.into_inner();
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&*error);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return AppError::PayloadTooLarge { limit };
        }
        source = current.source();
    }
    AppError::Validation(format!("Failed to read request body: {}", error))
}
