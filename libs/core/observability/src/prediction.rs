//! Prediction pipeline metrics.

use metrics::{counter, histogram};
use std::time::Duration;

/// Prediction metrics recorder
pub struct PredictionMetrics;

impl PredictionMetrics {
    /// Response cache served an authoritative id list
    pub fn record_cache_hit() {
        counter!("prediction_cache_hits_total").increment(1);
    }

    /// Response cache could not be used. `reason` is one of `absent`,
    /// `short`, `malformed`, `error`.
    pub fn record_cache_miss(reason: &'static str) {
        counter!("prediction_cache_misses_total", "reason" => reason).increment(1);
    }

    /// Pipeline ended with a caller-visible error
    pub fn record_failure(kind: &'static str) {
        counter!("prediction_failures_total", "kind" => kind).increment(1);
    }

    /// An item was returned with empty fields
    pub fn record_entity_degraded(reason: &'static str) {
        counter!("prediction_entity_degraded_total", "reason" => reason).increment(1);
    }

    /// Where an item's metadata came from: `cache`, `store` or `none`
    pub fn record_entity_source(source: &'static str) {
        counter!("prediction_entity_lookups_total", "source" => source).increment(1);
    }

    pub fn record_cache_write_failure(kind: &'static str) {
        counter!("prediction_cache_write_failures_total", "kind" => kind).increment(1);
    }

    pub fn record_cache_write_dropped(kind: &'static str) {
        counter!("prediction_cache_write_dropped_total", "kind" => kind).increment(1);
    }

    pub fn record_stage_duration(stage: &'static str, elapsed: Duration) {
        histogram!("prediction_stage_duration_seconds", "stage" => stage)
            .record(elapsed.as_secs_f64());
    }

    pub fn record_request(outcome: &'static str, elapsed: Duration) {
        counter!("prediction_requests_total", "outcome" => outcome).increment(1);
        histogram!("prediction_request_duration_seconds", "outcome" => outcome)
            .record(elapsed.as_secs_f64());

        tracing::debug!(
            outcome,
            duration_ms = elapsed.as_millis() as u64,
            "prediction finished"
        );
    }
}
