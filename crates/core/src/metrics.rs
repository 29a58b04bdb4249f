//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Selection (searches by outcome, rejected candidates)
//! - Providers (failures, request durations)
//! - Dispatch (snatches, failures) and notifications

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Selection
// =============================================================================

/// Searches total by outcome.
pub static SEARCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encore_searches_total", "Total album searches"),
        // "nothing_found", "no_suitable_release", "choices", "payload_unresolvable",
        // "not_snatched", "snatched"
        &["outcome"],
    )
    .unwrap()
});

/// Candidates dropped by a filtering stage.
pub static CANDIDATES_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "encore_candidates_rejected_total",
            "Candidates rejected by filtering stage",
        ),
        &["stage"], // "token", "size", "duplicate"
    )
    .unwrap()
});

// =============================================================================
// Providers
// =============================================================================

/// Provider searches that failed.
pub static PROVIDER_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encore_provider_failures_total", "Failed provider searches"),
        &["provider"],
    )
    .unwrap()
});

/// Provider search duration in seconds.
pub static PROVIDER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "encore_provider_duration_seconds",
            "Duration of provider searches",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["provider"],
    )
    .unwrap()
});

// =============================================================================
// Dispatch
// =============================================================================

/// Successful snatches by candidate kind and backend.
pub static SNATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encore_snatches_total", "Total snatched releases"),
        &["kind", "backend"],
    )
    .unwrap()
});

/// Dispatches that produced no snatch.
pub static DISPATCH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encore_dispatch_failures_total", "Failed dispatches"),
        &["backend"],
    )
    .unwrap()
});

/// Notification deliveries that failed.
pub static NOTIFICATION_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "encore_notification_failures_total",
            "Failed notification deliveries",
        ),
        &["channel"],
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SEARCHES_TOTAL.clone()),
        Box::new(CANDIDATES_REJECTED.clone()),
        Box::new(PROVIDER_FAILURES.clone()),
        Box::new(PROVIDER_DURATION.clone()),
        Box::new(SNATCHES_TOTAL.clone()),
        Box::new(DISPATCH_FAILURES.clone()),
        Box::new(NOTIFICATION_FAILURES.clone()),
    ]
}
