//! Patient registration and queue endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::orchestrator::{
    PatientDetail, QueueEntry, QueueStats, RegisterPatient, RegistrationOutcome,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub phone: String,
    pub reason: String,
}

#[derive(Serialize)]
pub struct RegistrationResponse {
    #[serde(flatten)]
    pub outcome: RegistrationOutcome,
    pub message: String,
}

/// `POST /api/patients/register` — self registration. Urgency is rated
/// by the triage classifier from the free-text reason; classifier
/// failures fall back to the default so registration never blocks.
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), ApiError> {
    let urgency = ctx.classifier.classify(&req.reason).await;
    let outcome = ctx.orchestrator.register(RegisterPatient {
        name: req.name,
        phone: req.phone,
        reason: req.reason,
        urgency,
    })?;

    let message = format!(
        "Token #{:03} issued. You are #{} in line. Estimated wait: {} min.",
        outcome.token_number, outcome.queue_position, outcome.estimated_wait_minutes
    );
    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse { outcome, message }),
    ))
}

/// `GET /api/patients/queue` — ranked waiting patients, then those in
/// consultation (for the doctor view).
pub async fn queue(
    State(ctx): State<ApiContext>,
) -> Result<Json<Vec<QueueEntry>>, ApiError> {
    Ok(Json(ctx.orchestrator.queue_view()?))
}

/// `GET /api/patients/stats` — live queue statistics.
pub async fn stats(State(ctx): State<ApiContext>) -> Result<Json<QueueStats>, ApiError> {
    Ok(Json(ctx.orchestrator.stats()?))
}

/// `GET /api/patients/:id` — one patient with live queue placement.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<PatientDetail>, ApiError> {
    Ok(Json(ctx.orchestrator.patient_detail(&patient_id)?))
}
