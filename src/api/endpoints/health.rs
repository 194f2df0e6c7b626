//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub in_queue: i64,
    pub observers: usize,
}

/// `GET /api/health` — liveness check for monitors and load balancers.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let stats = ctx.orchestrator.stats()?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        in_queue: stats.in_queue,
        observers: ctx.notifier.observer_count(),
    }))
}
