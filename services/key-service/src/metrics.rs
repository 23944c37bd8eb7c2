//! Prometheus metrics for Key Service.
//!
//! Counters and histograms registered in the default registry and exposed
//! through `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// HTTP requests counter.
pub static REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "key_service_requests_total",
        "Total number of key API requests",
        &["operation", "outcome"]
    )
    .expect("Failed to register requests metric")
});

/// Stored document reads by recognised format.
pub static DOCUMENT_READS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "key_service_document_reads_total",
        "Total number of key documents read, by stored format",
        &["format"]
    )
    .expect("Failed to register document_reads metric")
});

/// Key API latency histogram.
pub static REQUEST_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "key_service_request_latency_seconds",
        "Key API request latency in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register request_latency metric")
});

/// Record a finished key API request.
pub fn record_request(operation: &str, outcome: &str, duration_secs: f64) {
    REQUESTS.with_label_values(&[operation, outcome]).inc();
    REQUEST_LATENCY
        .with_label_values(&[operation])
        .observe(duration_secs);
}

/// Record a stored document read (`current`, `legacy` or `unknown`).
pub fn record_document_read(format: &str) {
    DOCUMENT_READS.with_label_values(&[format]).inc();
}

/// Render every registered metric in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
