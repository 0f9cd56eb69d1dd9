//! HTTP routes and their coverage probes.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use covrig_common::constants::{HEALTH_ROUTE, PING_BODY, PING_ROUTE, UNUSED_BODY, UNUSED_ROUTE};
use covrig_coverage::recorder::CoverageRecorder;

/// Probe bumped by `GET /ping`.
pub const PING_PROBE: &str = "GET /ping";

/// Probe bumped by `GET /unused`.
pub const UNUSED_PROBE: &str = "GET /unused";

/// Every probe the service registers up front, so unhit ones still appear
/// in the artifact.
pub const PROBES: [&str; 2] = [PING_PROBE, UNUSED_PROBE];

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Coverage counters for this process.
    pub recorder: Arc<CoverageRecorder>,
}

impl AppState {
    /// State with a fresh recorder for [`PROBES`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            recorder: Arc::new(CoverageRecorder::new(PROBES)),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(PING_ROUTE, get(ping))
        .route(UNUSED_ROUTE, get(unused))
        .route(HEALTH_ROUTE, get(health))
        .with_state(state)
}

async fn ping(State(state): State<AppState>) -> &'static str {
    state.recorder.hit(PING_PROBE);
    PING_BODY
}

async fn unused(State(state): State<AppState>) -> &'static str {
    state.recorder.hit(UNUSED_PROBE);
    UNUSED_BODY
}

async fn health() -> &'static str {
    "ok"
}
