//! Read-only HTTP status surface
//!
//! Exposes the scheduler's snapshot accessors plus liveness/readiness
//! probes and the Prometheus exposition endpoint. Strictly observational:
//! no route mutates the fleet.
//!
//! Routes:
//! - `GET /health/live` — process liveness
//! - `GET /health/ready` — readiness (scheduler running)
//! - `GET /stats` — fleet counters and derived rates
//! - `GET /sources` — per-source status rows
//! - `GET /metrics` — Prometheus text exposition

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::metrics;
use crate::scheduler::SignalScheduler;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub scheduler: SignalScheduler,
}

/// Probe response body
#[derive(Debug, Serialize)]
struct ProbeResponse {
    status: &'static str,
    timestamp: String,
}

/// Build the status router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/stats", get(stats))
        .route("/sources", get(sources))
        .route("/metrics", get(metrics_text))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves
pub async fn serve(
    addr: &str,
    scheduler: SignalScheduler,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "status server listening");
    axum::serve(listener, router(AppState { scheduler }))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn liveness() -> impl IntoResponse {
    Json(ProbeResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.scheduler.is_running() {
        (
            StatusCode::OK,
            Json(ProbeResponse {
                status: "ready",
                timestamp: Utc::now().to_rfc3339(),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeResponse {
                status: "not_ready",
                timestamp: Utc::now().to_rfc3339(),
            }),
        )
    }
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.get_stats().await)
}

async fn sources(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.get_source_statuses().await)
}

async fn metrics_text() -> impl IntoResponse {
    match metrics::encode_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!("metrics encoding failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "metrics unavailable".to_string(),
            )
        }
    }
}
