//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Purchase routines (submit attempts, token rounds, outcomes, registered intents)
//! - Scheduler (tasks armed and fired)
//! - Clock sync (current offset, failures)
//! - Notifications

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Routine Metrics
// =============================================================================

/// Order submissions total by classified result.
pub static SUBMIT_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("presale_submit_attempts_total", "Total order submissions"),
        &["result"], // "success", "ambiguous", "price_mismatch", "not_sellable", "retry", "error"
    )
    .unwrap()
});

/// Submission round-trip duration in seconds.
pub static SUBMIT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "presale_submit_duration_seconds",
            "Duration of order submission calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &[],
    )
    .unwrap()
});

/// Purchase-token rounds by result.
pub static TOKEN_ROUNDS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("presale_token_rounds_total", "Total purchase-token rounds"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Routines that reached a terminal state.
pub static ROUTINE_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "presale_routine_outcomes_total",
            "Total routines finished by terminal state",
        ),
        &["state"], // "success", "failed", "error"
    )
    .unwrap()
});

/// Routines currently running.
pub static ROUTINES_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("presale_routines_running", "Routines currently running").unwrap()
});

/// Intents held by the supervisor.
pub static INTENTS_REGISTERED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "presale_intents_registered",
        "Purchase intents with a routine",
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Scheduled tasks fired.
pub static TASKS_FIRED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("presale_scheduler_tasks_fired_total", "Total tasks fired").unwrap()
});

/// Tasks currently armed.
pub static TASKS_ARMED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("presale_scheduler_tasks_armed", "Tasks waiting to fire").unwrap()
});

// =============================================================================
// Clock Metrics
// =============================================================================

/// Last synced offset between authority and local clock, in milliseconds.
pub static CLOCK_OFFSET_MS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "presale_clock_offset_milliseconds",
        "Authority time minus local time",
    )
    .unwrap()
});

/// Clock sync failures total.
pub static CLOCK_SYNC_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "presale_clock_sync_failures_total",
        "Total failed clock syncs",
    )
    .unwrap()
});

// =============================================================================
// Notification Metrics
// =============================================================================

/// Notifications sent by backend and status.
pub static NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("presale_notifications_total", "Total notifications sent"),
        &["backend", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Routines
        Box::new(SUBMIT_ATTEMPTS.clone()),
        Box::new(SUBMIT_DURATION.clone()),
        Box::new(TOKEN_ROUNDS.clone()),
        Box::new(ROUTINE_OUTCOMES.clone()),
        Box::new(ROUTINES_RUNNING.clone()),
        Box::new(INTENTS_REGISTERED.clone()),
        // Scheduler
        Box::new(TASKS_FIRED.clone()),
        Box::new(TASKS_ARMED.clone()),
        // Clock
        Box::new(CLOCK_OFFSET_MS.clone()),
        Box::new(CLOCK_SYNC_FAILURES.clone()),
        // Notifications
        Box::new(NOTIFICATIONS.clone()),
    ]
}
