//! HTTP request handlers for the chat-relay API

use crate::auth::{self, SessionResolver};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::middleware::request_id_middleware;
use crate::providers::Providers;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub mod extract;
pub mod health;
pub mod metrics;
pub mod relay;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state shared across all handlers
///
/// Built once at startup. All fields are Arc'd for cheap cloning across
/// Axum handlers; nothing in here is mutated per request.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    providers: Arc<Providers>,
    sessions: Arc<dyn SessionResolver>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Create a new AppState from configuration
    ///
    /// One pooled HTTP client is shared by both providers and the session
    /// resolver. Its total timeout bounds every upstream call, streamed body
    /// included.
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let providers = Providers::from_config(&config, http.clone());
        let sessions = auth::resolver_from_config(&config.auth, http);

        Self::from_parts(config, providers, sessions)
    }

    /// Assemble state from already-built components
    pub fn from_parts(
        config: Arc<Config>,
        providers: Providers,
        sessions: Arc<dyn SessionResolver>,
    ) -> AppResult<Self> {
        let metrics = Metrics::new()
            .map_err(|e| AppError::Internal(format!("Failed to initialize metrics: {}", e)))?;

        Ok(Self {
            config,
            providers: Arc::new(providers),
            sessions,
            metrics: Arc::new(metrics),
        })
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the provider registry
    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    /// Get reference to the session resolver
    pub fn sessions(&self) -> &dyn SessionResolver {
        self.sessions.as_ref()
    }

    /// Get reference to the metrics collector
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

/// Build the application router with all routes and middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/completions", post(relay::handler))
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}
