//! Prometheus metrics for intercepted calls.
use crate::call::CallShape;
use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    /// Intercepted calls by method, call shape and what happened to them
    pub static ref CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rift_grpc_mock_calls_total",
        "Total number of gRPC calls seen by the mock adapter",
        &["method", "shape", "disposition"]  // disposition: passthrough|stubbed|blocked
    )
    .expect("rift_grpc_mock_calls_total is registered once");
}

/// What the adapter did with a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Passthrough,
    Stubbed,
    Blocked,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Passthrough => "passthrough",
            Disposition::Stubbed => "stubbed",
            Disposition::Blocked => "blocked",
        }
    }
}

/// Helper to record an intercepted call
pub fn record_call(method: &str, shape: CallShape, disposition: Disposition) {
    CALLS_TOTAL
        .with_label_values(&[method, shape.as_str(), disposition.as_str()])
        .inc();
}

/// Current count for one label set.
pub fn call_count(method: &str, shape: CallShape, disposition: Disposition) -> u64 {
    CALLS_TOTAL
        .with_label_values(&[method, shape.as_str(), disposition.as_str()])
        .get()
}

/// Collect and return all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
