//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Encore server:
//! - HTTP request metrics (latency, counts)
//! - Wanted-search scheduler activity
//! - Library album counts by status (collected dynamically)
//! - Everything `encore_core::metrics` records for searches and dispatches

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use encore_core::library::{AlbumFilter, AlbumStatus};

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
            "encore_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        // searches wait on providers and backends, hence the long tail
        .buckets(vec![0.005, 0.025, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encore_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "encore_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Whether the wanted scheduler loop is running.
pub static WANTED_SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "encore_wanted_scheduler_running",
        "Whether the wanted-album scheduler is running (1 = yes)",
    )
    .unwrap()
});

/// Completed wanted passes by result.
pub static WANTED_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encore_wanted_runs_total", "Wanted-album search passes"),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Library Metrics
// =============================================================================

/// Albums by status (collected dynamically).
pub static ALBUMS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("encore_albums_by_status", "Library albums by status"),
        &["status"],
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

    // Scheduler
    registry
        .register(Box::new(WANTED_SCHEDULER_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(WANTED_RUNS_TOTAL.clone()))
        .unwrap();

    // Library
    registry
        .register(Box::new(ALBUMS_BY_STATUS.clone()))
        .unwrap();

    // Core metrics (searches, providers, dispatch, notifications)
    for metric in encore_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges that mirror library state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    for status in [
        AlbumStatus::Skipped,
        AlbumStatus::Wanted,
        AlbumStatus::WantedLossless,
        AlbumStatus::Snatched,
        AlbumStatus::Downloaded,
    ] {
        let filter = AlbumFilter::new().with_status(status).with_limit(i64::MAX);
        if let Ok(albums) = state.albums().list_albums(&filter) {
            ALBUMS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(albums.len() as i64);
        }
    }
}

static ID_SEGMENT: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"^(/api/v1/albums/)[^/]+").unwrap());

/// Normalize a path for metric labels (album ids become a placeholder).
pub fn normalize_path(path: &str) -> String {
    ID_SEGMENT.replace(path, "${1}{id}").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_album_paths() {
        assert_eq!(
            normalize_path("/api/v1/albums/0f8e3c1a-rg/search"),
            "/api/v1/albums/{id}/search"
        );
        assert_eq!(normalize_path("/api/v1/albums/rg-1"), "/api/v1/albums/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/albums"), "/api/v1/albums");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("encore_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        encore_core::metrics::SEARCHES_TOTAL
            .with_label_values(&["nothing_found"])
            .inc();
        WANTED_SCHEDULER_RUNNING.set(0);

        let output = encode_metrics();
        assert!(output.contains("encore_searches_total"));
        assert!(output.contains("encore_wanted_scheduler_running"));
    }
}
