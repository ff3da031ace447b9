//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the presale server:
//! - HTTP request metrics (latency, counts)
//! - Routine counts by state (collected dynamically)
//! - Clock sync status (collected dynamically)
//!
//! Core component metrics (submissions, scheduler, clock offset) are
//! registered alongside from `presale_core::metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

use presale_core::RoutineState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "presale_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("presale_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "presale_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Routine Metrics (collected dynamically)
// =============================================================================

/// Registered routines by current state.
pub static ROUTINES_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("presale_routines_by_state", "Current routine count by state"),
        &["state"],
    )
    .unwrap()
});

// =============================================================================
// Clock Metrics (collected dynamically)
// =============================================================================

/// Clock sync loop state (1 = running, 0 = stopped or disabled).
pub static CLOCK_SYNC_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "presale_clock_sync_running",
        "Whether the clock sync loop is running (1) or not (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Routines
    registry
        .register(Box::new(ROUTINES_BY_STATE.clone()))
        .unwrap();

    // Clock
    registry
        .register(Box::new(CLOCK_SYNC_RUNNING.clone()))
        .unwrap();

    // Core metrics (routines, scheduler, clock, notifications)
    for metric in presale_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the supervisor and clock sync
/// as they are right now.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let statuses = state.supervisor().statuses().await;
    for label in [
        RoutineState::Idle.label(),
        RoutineState::Resolving.label(),
        RoutineState::TokenAcquired.label(),
        RoutineState::Submitting.label(),
        RoutineState::Retrying.label(),
        RoutineState::Cancelled.label(),
        "success",
        "failed",
        "error",
    ] {
        let count = statuses
            .iter()
            .filter(|s| s.state.label() == label)
            .count();
        ROUTINES_BY_STATE
            .with_label_values(&[label])
            .set(count as i64);
    }

    let clock_running = state.clock().is_some_and(|c| c.is_running());
    CLOCK_SYNC_RUNNING.set(if clock_running { 1 } else { 0 });
}

static HASH_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/[0-9a-fA-F]{16}(/|$)").unwrap());
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace intent hashes and numeric
/// ids with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = HASH_SEGMENT.replace_all(path, "/{hash}$1");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
