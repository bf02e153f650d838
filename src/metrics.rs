use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Metric name prefix for all metadata API metrics
const PREFIX: &str = "metadata";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref MALFORMED_PAYLOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_malformed_payloads_total"),
            "Annotation JSON columns that failed to parse and were dropped"
        ),
        &["field"]
    ).expect("Failed to create malformed_payloads_total metric");

    pub static ref DEGRADED_FETCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_degraded_fetches_total"),
            "Sub-relation fetches that failed and were replaced by an empty result"
        ),
        &["relation"]
    ).expect("Failed to create degraded_fetches_total metric");

    pub static ref BATCH_CATEGORY_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_batch_category_failures_total"),
            "Multi-category lookups that reported an error for a category"
        ),
        &["category"]
    ).expect("Failed to create batch_category_failures_total metric");

    pub static ref OPERATION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_operation_duration_seconds"),
            "Duration of store operations in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        &["operation"]
    ).expect("Failed to create operation_duration_seconds metric");
}

/// Register all metrics with the registry. Safe to call more than once.
pub fn init_metrics() {
    // Already-registered errors are expected when tests call this repeatedly
    let _ = REGISTRY.register(Box::new(MALFORMED_PAYLOADS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DEGRADED_FETCHES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BATCH_CATEGORY_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(OPERATION_DURATION_SECONDS.clone()));

    tracing::debug!("Metrics registered");
}

pub fn record_malformed_payload(field: &str) {
    MALFORMED_PAYLOADS_TOTAL.with_label_values(&[field]).inc();
}

pub fn record_degraded_fetch(relation: &str) {
    DEGRADED_FETCHES_TOTAL.with_label_values(&[relation]).inc();
}

pub fn record_batch_category_failure(category: &str) {
    BATCH_CATEGORY_FAILURES_TOTAL
        .with_label_values(&[category])
        .inc();
}

pub fn record_operation(operation: &str, duration: Duration) {
    OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Text exposition of everything in [`REGISTRY`].
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_malformed_payload_counter_is_labelled_by_field() {
        init_metrics();
        let before = MALFORMED_PAYLOADS_TOTAL
            .with_label_values(&["test_field"])
            .get();
        record_malformed_payload("test_field");
        let after = MALFORMED_PAYLOADS_TOTAL
            .with_label_values(&["test_field"])
            .get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_render_contains_prefixed_names() {
        init_metrics();
        record_degraded_fetch("album_images");
        record_operation("resolve_track", Duration::from_millis(3));

        let text = render_metrics();
        assert!(text.contains("metadata_degraded_fetches_total"));
        assert!(text.contains("metadata_operation_duration_seconds"));
    }
}
