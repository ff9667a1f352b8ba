// Metrics and observability module
// This file registers the Prometheus series for proxied requests,
// the session pool and config persistence
//
// Numan Thabit 2025 Nov

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gateway_requests_total",
        "completed upstream requests by outcome",
        &["outcome"]
    )
    .unwrap()
});

pub static REQUEST_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "gateway_request_latency_seconds",
        "latency of completed upstream requests",
        &["model"]
    )
    .unwrap()
});

pub static SESSION_POOL_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("gateway_session_pool_size", "sessions in the failover pool").unwrap()
});

pub static PERSIST_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gateway_config_persist_failures_total",
        "failed writes of the config document"
    )
    .unwrap()
});

/// Render the default registry in the text exposition format.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
