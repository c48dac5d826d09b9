//! Metrics collection for identity-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static ISSUANCE_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ENGINE_CALLS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize metrics collection.
pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }

    let registry = Registry::new();

    let issuance_counter = IntCounterVec::new(
        Opts::new(
            "identity_issuance_total",
            "Total issuance requests by issuer account, path, and status",
        ),
        &["account_id", "path", "status"],
    )
    .expect("Failed to create identity_issuance_total metric");

    let engine_calls_counter = IntCounterVec::new(
        Opts::new(
            "commitment_engine_calls_total",
            "Total commitment engine calls by operation and status",
        ),
        &["operation", "status"],
    )
    .expect("Failed to create commitment_engine_calls_total metric");

    registry
        .register(Box::new(issuance_counter.clone()))
        .expect("Failed to register identity_issuance_total");
    registry
        .register(Box::new(engine_calls_counter.clone()))
        .expect("Failed to register commitment_engine_calls_total");

    PROMETHEUS_REGISTRY
        .set(registry)
        .expect("Failed to set prometheus registry");
    ISSUANCE_TOTAL
        .set(issuance_counter)
        .expect("Failed to set identity_issuance_total");
    ENGINE_CALLS_TOTAL
        .set(engine_calls_counter)
        .expect("Failed to set commitment_engine_calls_total");
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Record an issuance request outcome.
pub fn record_issuance(account_id: &str, path: &str, status: &str) {
    if let Some(counter) = ISSUANCE_TOTAL.get() {
        counter.with_label_values(&[account_id, path, status]).inc();
    }
}

/// Record a commitment engine call.
pub fn record_engine_call(operation: &str, status: &str) {
    if let Some(counter) = ENGINE_CALLS_TOTAL.get() {
        counter.with_label_values(&[operation, status]).inc();
    }
}
