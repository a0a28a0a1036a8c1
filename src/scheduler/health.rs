//! Fleet health monitoring
//!
//! The health loop is purely observational: it scores every known source,
//! classifies the ones falling below the threshold as unhealthy, and emits
//! a fleet-wide snapshot on the notification channel. It never changes a
//! source's status — demotion and resurrection belong to the poll path and
//! the retry loop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{Inner, SignalScheduler};
use crate::adapter::AdapterState;
use crate::events::SignalEvent;
use crate::models::SourceStatus;

/// Sources scoring below this are reported unhealthy
pub const UNHEALTHY_THRESHOLD: f64 = 0.5;

/// Hours over which freshness decays from 1 to 0
pub const FRESHNESS_WINDOW_HOURS: f64 = 24.0;

/// Weight of the recent success ratio in the combined score
const SUCCESS_WEIGHT: f64 = 0.7;
/// Weight of time-since-last-success in the combined score
const FRESHNESS_WEIGHT: f64 = 0.3;

/// Health entry for one source
#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub source_id: String,
    pub name: String,
    pub status: SourceStatus,
    pub health_score: f64,
    pub healthy: bool,
    pub consecutive_errors: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Fleet-wide snapshot emitted as a `health_check` event
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_sources: usize,
    pub active_sources: usize,
    pub healthy_sources: usize,
    pub unhealthy_sources: usize,
    pub sources: Vec<SourceHealth>,
}

/// Combined health score for one adapter's recent behavior
///
/// 0.7 × success ratio over the retained poll history plus 0.3 × freshness,
/// where freshness decays linearly to zero over 24 hours since the last
/// successful poll. A source that has never polled scores on ratio alone
/// (treated as 1.0) and is not flagged unhealthy until it has history.
pub fn health_score(state: &AdapterState, now: DateTime<Utc>) -> f64 {
    let success_ratio = if state.history.is_empty() {
        1.0
    } else {
        let successes = state.history.iter().filter(|r| r.success).count();
        successes as f64 / state.history.len() as f64
    };

    let freshness = state
        .last_success_at
        .map(|at| {
            let hours = (now - at).num_minutes() as f64 / 60.0;
            (1.0 - hours / FRESHNESS_WINDOW_HOURS).clamp(0.0, 1.0)
        })
        .unwrap_or(0.0);

    SUCCESS_WEIGHT * success_ratio + FRESHNESS_WEIGHT * freshness
}

/// Whether a source with this state counts as healthy
pub fn is_healthy(state: &AdapterState, score: f64) -> bool {
    state.history.is_empty() || score >= UNHEALTHY_THRESHOLD
}

impl SignalScheduler {
    /// Run one health pass now and return (and publish) the snapshot
    pub async fn run_health_check(&self) -> HealthSnapshot {
        health_cycle(&self.inner).await
    }
}

/// One pass of the health monitoring loop
pub(super) async fn health_cycle(inner: &Arc<Inner>) -> HealthSnapshot {
    let sources = inner.sources.read().await;
    let now = Utc::now();

    let mut rows = Vec::with_capacity(sources.len());
    let mut active = 0usize;
    let mut failed = 0usize;
    for (id, entry) in sources.iter() {
        let source = entry.source.read().await;
        match source.status {
            SourceStatus::Active => active += 1,
            SourceStatus::Error => failed += 1,
            SourceStatus::Inactive => {}
        }
        let state = entry.harness.state();
        let score = health_score(&state, now);
        rows.push(SourceHealth {
            source_id: id.clone(),
            name: source.name.clone(),
            status: source.status,
            health_score: score,
            healthy: is_healthy(&state, score),
            consecutive_errors: state.consecutive_errors,
            last_success_at: state.last_success_at,
        });
    }
    rows.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    let healthy = rows.iter().filter(|r| r.healthy).count();
    let snapshot = HealthSnapshot {
        timestamp: now,
        total_sources: rows.len(),
        active_sources: active,
        healthy_sources: healthy,
        unhealthy_sources: rows.len() - healthy,
        sources: rows,
    };

    crate::metrics::update_fleet_gauges(active, failed);
    tracing::debug!(
        total = snapshot.total_sources,
        healthy = snapshot.healthy_sources,
        unhealthy = snapshot.unhealthy_sources,
        "health check"
    );
    inner.events.publish(SignalEvent::HealthCheck(snapshot.clone()));
    snapshot
}
