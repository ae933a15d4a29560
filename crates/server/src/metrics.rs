//! Prometheus metrics for the lyrebird server.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it. It
//! exposes aggregate counts only (no artists, titles or request ids), but the
//! service is meant to run on localhost and the endpoint should not be exposed
//! beyond it.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Cache metrics
pub static CACHE_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lyrebird_cache_hits_total",
        "Total number of translation requests served from cache",
    )
    .expect("metric creation failed")
});

pub static CACHE_MISSES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lyrebird_cache_misses_total",
        "Total number of translation requests not found in cache",
    )
    .expect("metric creation failed")
});

// Lock metrics
pub static REQUESTS_IN_PROGRESS_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lyrebird_requests_in_progress_rejected_total",
        "Total number of duplicate requests answered with an in-progress notice",
    )
    .expect("metric creation failed")
});

pub static STALE_LOCKS_REMOVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lyrebird_stale_locks_removed_total",
        "Total number of stale locks removed by status checks and cleanup",
    )
    .expect("metric creation failed")
});

// Upstream metrics
pub static UPSTREAM_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lyrebird_upstream_failures_total",
        "Total number of failed upstream generation calls",
    )
    .expect("metric creation failed")
});

pub static UPSTREAM_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "lyrebird_upstream_duration_seconds",
            "Time taken by an upstream generation call",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0]),
    )
    .expect("metric creation failed")
});

pub static EXTRACTION_TIER: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lyrebird_extraction_tier_total",
            "Model responses by the extraction tier that recovered them",
        ),
        &["tier"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so integration tests can build as many routers as they like.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(CACHE_HITS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CACHE_MISSES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(REQUESTS_IN_PROGRESS_REJECTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STALE_LOCKS_REMOVED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPSTREAM_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPSTREAM_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(EXTRACTION_TIER.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Count a response recovered by `tier`.
pub fn record_extraction_tier(tier: &str) {
    EXTRACTION_TIER.with_label_values(&[tier]).inc();
}
