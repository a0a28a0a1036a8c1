//! Prometheus metrics for the siphon engine
//!
//! Tracks per-source poll outcomes and durations, ingested item counts and
//! fleet state gauges.
//!
//! # Usage
//!
//! Call `init_metrics()` once at application startup to register all
//! metrics. If initialization fails (or never happens, as in most tests),
//! every recorder is a no-op.

use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all engine metrics
struct EngineMetrics {
    polls_total: CounterVec,
    items_ingested_total: CounterVec,
    poll_duration_seconds: HistogramVec,
    active_sources: Gauge,
    failed_sources: Gauge,
}

/// Global storage for engine metrics
static ENGINE_METRICS: OnceLock<EngineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Idempotent; call once at application startup. On registration failure
/// the error is returned and all metric operations stay no-ops.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = EngineMetrics {
        polls_total: register_counter_vec!(
            "siphon_polls_total",
            "Total polls executed by source and outcome",
            &["source", "outcome"]
        )?,
        items_ingested_total: register_counter_vec!(
            "siphon_items_ingested_total",
            "Total validated items ingested by source",
            &["source"]
        )?,
        poll_duration_seconds: register_histogram_vec!(
            "siphon_poll_duration_seconds",
            "Poll duration in seconds by source",
            &["source"],
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )?,
        active_sources: register_gauge!(
            "siphon_active_sources",
            "Number of sources currently in active status"
        )?,
        failed_sources: register_gauge!(
            "siphon_failed_sources",
            "Number of sources currently in error status"
        )?,
    };

    ENGINE_METRICS
        .set(metrics)
        .map_err(|_| "Engine metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    ENGINE_METRICS.get().is_some()
}

// ============================================================================
// Recorders
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one poll with its outcome ("success" / "failure") and duration
pub fn record_poll(source: &str, outcome: &str, duration_ms: u64) {
    let Some(m) = ENGINE_METRICS.get() else {
        return;
    };

    m.polls_total.with_label_values(&[source, outcome]).inc();
    m.poll_duration_seconds
        .with_label_values(&[source])
        .observe(duration_ms as f64 / 1000.0);
}

/// Record validated items ingested from one poll
pub fn record_items(source: &str, count: u64) {
    if count == 0 {
        return;
    }
    if let Some(m) = ENGINE_METRICS.get() {
        m.items_ingested_total
            .with_label_values(&[source])
            .inc_by(count as f64);
    }
}

/// Update fleet state gauges
pub fn update_fleet_gauges(active: usize, failed: usize) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.active_sources.set(active as f64);
        m.failed_sources.set(failed as f64);
    }
}

// ============================================================================
// Tests
// ============================================================================
