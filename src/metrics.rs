//! Prometheus metrics collection for chat-relay
//!
//! This module provides metrics instrumentation for tracking:
//! - Relayed requests by provider
//! - Request failures by failure kind
//! - Upstream streams that failed after the response had started
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.

use crate::providers::ModelProvider;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Failure classification for type-safe metrics labels
///
/// Restricts label values to a fixed set so cardinality stays bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No session, or a session without a user id
    Unauthorized,
    /// Malformed body, missing fields, unknown provider
    Validation,
    /// The provider rejected the call or its stream broke
    Upstream,
    /// Anything else (transport failures, misconfiguration)
    Internal,
}

impl FailureKind {
    /// Convert failure kind to Prometheus label string
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::Validation => "validation",
            FailureKind::Upstream => "upstream",
            FailureKind::Internal => "internal",
        }
    }
}

/// Metrics collector for chat-relay
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    requests_total: IntCounterVec,
    request_failures: IntCounterVec,
    stream_failures: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 2 providers
        let requests_total = IntCounterVec::new(
            Opts::new(
                "chat_relay_requests_total",
                "Total number of chat requests dispatched to a provider",
            ),
            &["provider"],
        )?;

        // Cardinality: 4 failure kinds
        let request_failures = IntCounterVec::new(
            Opts::new(
                "chat_relay_request_failures_total",
                "Total number of chat requests answered with an error response, by failure kind",
            ),
            &["kind"],
        )?;

        // Mid-stream failures never produce an error status (the 200 has already
        // been sent), so this counter is the only place they become visible.
        let stream_failures = IntCounterVec::new(
            Opts::new(
                "chat_relay_stream_failures_total",
                "Total number of provider streams aborted after the response started",
            ),
            &["provider"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_failures.clone()))?;
        registry.register(Box::new(stream_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            request_failures,
            stream_failures,
        })
    }

    /// Record a request dispatched to a provider
    pub fn record_request(&self, provider: ModelProvider) {
        match self
            .requests_total
            .get_metric_with_label_values(&[provider.as_str()])
        {
            Ok(counter) => counter.inc(),
            Err(e) => tracing::warn!(
                error = %e,
                provider = %provider,
                "Failed to record request metric"
            ),
        }
    }

    /// Record a request that ended with an error response
    pub fn record_failure(&self, kind: FailureKind) {
        match self
            .request_failures
            .get_metric_with_label_values(&[kind.as_str()])
        {
            Ok(counter) => counter.inc(),
            Err(e) => tracing::warn!(
                error = %e,
                kind = kind.as_str(),
                "Failed to record failure metric"
            ),
        }
    }

    /// Record a provider stream that broke after the response started
    pub fn record_stream_failure(&self, provider: ModelProvider) {
        match self
            .stream_failures
            .get_metric_with_label_values(&[provider.as_str()])
        {
            Ok(counter) => counter.inc(),
            Err(e) => tracing::warn!(
                error = %e,
                provider = %provider,
                "Failed to record stream failure metric"
            ),
        }
    }

    /// Current request count for a provider
    pub fn requests_count(&self, provider: ModelProvider) -> u64 {
        self.requests_total
            .get_metric_with_label_values(&[provider.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Current failure count for a failure kind
    pub fn failures_count(&self, kind: FailureKind) -> u64 {
        self.request_failures
            .get_metric_with_label_values(&[kind.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Current mid-stream failure count for a provider
    pub fn stream_failures_count(&self, provider: ModelProvider) -> u64 {
        self.stream_failures
            .get_metric_with_label_values(&[provider.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Encode all registered metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| {
            tracing::error!(error = %e, "Prometheus encoder produced invalid UTF-8");
            prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new_registers_counters() {
        let metrics = Metrics::new().expect("should create metrics");
        metrics.record_request(ModelProvider::OpenAi);
        let output = metrics.gather().expect("should gather");
        assert!(output.contains("chat_relay_requests_total"));
    }

    #[test]
    fn test_record_request_increments_per_provider() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request(ModelProvider::Gemini);
        metrics.record_request(ModelProvider::Gemini);
        metrics.record_request(ModelProvider::OpenAi);

        assert_eq!(metrics.requests_count(ModelProvider::Gemini), 2);
        assert_eq!(metrics.requests_count(ModelProvider::OpenAi), 1);
    }

    #[test]
    fn test_record_failure_by_kind() {
        let metrics = Metrics::new().unwrap();
        metrics.record_failure(FailureKind::Unauthorized);
        metrics.record_failure(FailureKind::Validation);
        metrics.record_failure(FailureKind::Validation);

        assert_eq!(metrics.failures_count(FailureKind::Unauthorized), 1);
        assert_eq!(metrics.failures_count(FailureKind::Validation), 2);
        assert_eq!(metrics.failures_count(FailureKind::Internal), 0);
    }

    #[test]
    fn test_stream_failures_are_labelled_by_provider() {
        let metrics = Metrics::new().unwrap();
        metrics.record_stream_failure(ModelProvider::Gemini);

        let output = metrics.gather().unwrap();
        assert!(output.contains(r#"chat_relay_stream_failures_total{provider="gemini"} 1"#));
    }

    #[test]
    fn test_failure_kind_labels() {
        assert_eq!(FailureKind::Unauthorized.as_str(), "unauthorized");
        assert_eq!(FailureKind::Validation.as_str(), "validation");
        assert_eq!(FailureKind::Upstream.as_str(), "upstream");
        assert_eq!(FailureKind::Internal.as_str(), "internal");
    }
}
