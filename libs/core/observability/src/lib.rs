//! Metrics for the prediction service.
//!
//! This crate provides:
//! - Prometheus recorder installation and the `/metrics` handler
//! - Prediction pipeline counters and histograms
//! - Axum middleware for per-route request metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, PredictionMetrics};
//!
//! init_metrics()?;
//! PredictionMetrics::record_cache_hit();
//!
//! let app = Router::new().route("/metrics", get(metrics_handler));
//! ```

pub mod middleware;
pub mod prediction;

pub use middleware::metrics_middleware;
pub use prediction::PredictionMetrics;

pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Later calls return the same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();
        Ok(handle)
    })
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for /metrics endpoint
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );

    describe_counter!(
        "prediction_requests_total",
        "Prediction requests by outcome"
    );
    describe_histogram!(
        "prediction_request_duration_seconds",
        "End-to-end prediction latency"
    );
    describe_histogram!(
        "prediction_stage_duration_seconds",
        "Latency of embed, search and resolve stages"
    );
    describe_counter!(
        "prediction_cache_hits_total",
        "Response cache hits with an authoritative id list"
    );
    describe_counter!(
        "prediction_cache_misses_total",
        "Response cache misses by reason"
    );
    describe_counter!(
        "prediction_failures_total",
        "Predictions that ended with an error code"
    );
    describe_counter!(
        "prediction_entity_degraded_total",
        "Items returned with empty metadata"
    );
    describe_counter!(
        "prediction_entity_lookups_total",
        "Item metadata lookups by source"
    );
    describe_counter!(
        "prediction_cache_write_failures_total",
        "Background cache writes that failed or timed out"
    );
    describe_counter!(
        "prediction_cache_write_dropped_total",
        "Background cache writes dropped because the queue was full"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_before_init() {
        if get_metrics_handle().is_none() {
            assert!(metrics_handler().await.starts_with("# Metrics not initialized"));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        PredictionMetrics::record_cache_hit();
        PredictionMetrics::record_cache_miss("short");
        PredictionMetrics::record_failure("embedding");
    }
}
