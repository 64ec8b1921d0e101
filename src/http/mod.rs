//! The read-only HTTP JSON surface (ambient component A4): exactly the five
//! GET routes from `SPEC_FULL.md` §6, backed by snapshots published by the
//! dispatch consumer and the disk probe rather than any lock shared with the
//! engine's hot path.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::CacheSnapshot;
use crate::types::{DiskUsage, EngineStatus, Stats, Tracking};

/// Shared, read-only state the HTTP surface serves from. Every field is a
/// handle into state owned elsewhere (the dispatch consumer, the engine's
/// sync loop, the disk probe) — this struct never itself becomes a second
/// writer.
#[derive(Clone)]
pub struct AppState {
    /// The engine's live connection/sync/height status.
    pub status: Arc<Mutex<EngineStatus>>,
    /// The cache's most recently published stats/tracking snapshot.
    pub snapshot: Arc<RwLock<CacheSnapshot>>,
    /// The disk probe's most recent reading.
    pub disk: Arc<RwLock<DiskUsage>>,
    /// The installed Prometheus recorder handle, when `--metrics` was passed.
    pub metrics: Option<PrometheusHandle>,
}

/// Build the router: `/status`, `/stats`, `/tracking`, `/disk` always;
/// `/metrics` only when a recorder handle was installed.
#[must_use]
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/status", get(status))
        .route("/stats", get(stats))
        .route("/tracking", get(tracking))
        .route("/disk", get(disk));

    if state.metrics.is_some() {
        router = router.route("/metrics", get(metrics_text));
    }

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.status.lock().clone())
}

async fn stats(State(state): State<AppState>) -> Json<HashMap<String, Stats>> {
    Json(state.snapshot.read().stats.clone())
}

async fn tracking(State(state): State<AppState>) -> Json<Tracking> {
    Json(state.snapshot.read().tracking.clone())
}

async fn disk(State(state): State<AppState>) -> Json<DiskUsage> {
    Json(state.disk.read().clone())
}

async fn metrics_text(State(state): State<AppState>) -> String {
    state.metrics.as_ref().map(PrometheusHandle::render).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt as _;

    fn empty_state() -> AppState {
        AppState {
            status: Arc::new(Mutex::new(EngineStatus::default())),
            snapshot: Arc::new(RwLock::new(CacheSnapshot::default())),
            disk: Arc::new(RwLock::new(DiskUsage::default())),
            metrics: None,
        }
    }

    async fn get(router: Router, path: &str) -> StatusCode {
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn status_returns_200_with_empty_engine_state() {
        let router = router(empty_state());
        assert_eq!(get(router, "/status").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn stats_and_tracking_return_200_with_zero_blocks_applied() {
        let state = empty_state();
        assert_eq!(get(router(state.clone()), "/stats").await, StatusCode::OK);
        assert_eq!(get(router(state), "/tracking").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn disk_returns_200_even_before_any_probe_tick() {
        let router = router(empty_state());
        assert_eq!(get(router, "/disk").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_route_is_absent_when_not_enabled() {
        let router = router(empty_state());
        assert_eq!(get(router, "/metrics").await, StatusCode::NOT_FOUND);
    }
}
