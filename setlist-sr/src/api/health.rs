//! Health and diagnostics endpoint
//!
//! Reports liveness plus the session counters the resolution pipeline
//! maintains, so a monitor can tell "up" from "up but failing sessions".

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::Ordering;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok" while the process is serving)
    pub status: String,
    /// Module name ("setlist-sr")
    pub module: String,
    /// Crate version baked in at build time
    pub version: String,
    /// Seconds since the service came up
    pub uptime_seconds: u64,
    /// Resolution sessions that ran to a terminal event since startup
    pub sessions_completed: u64,
    /// Failure message from the most recent aborted session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
///
/// Liveness probe with pipeline diagnostics.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let sessions_completed = state.sessions_completed.load(Ordering::Relaxed);
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "setlist-sr".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        sessions_completed,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
