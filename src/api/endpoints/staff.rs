//! Staff control endpoints: walk-ins, emergencies, no-shows, doctor
//! toggling, rebalance, and the event log.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::EventRecord;
use crate::orchestrator::{
    DoctorToggled, NoShowMarked, RebalanceOutcome, RegisterPatient, RegistrationOutcome,
};

#[derive(Debug, Deserialize)]
pub struct WalkInRequest {
    pub name: String,
    pub phone: String,
    pub reason: String,
    pub urgency: i64,
}

#[derive(Serialize)]
pub struct WalkInResponse {
    #[serde(flatten)]
    pub outcome: RegistrationOutcome,
    pub message: String,
}

/// `POST /api/staff/register-walkin` — staff registers a walk-in with a
/// staff-judged urgency (no classifier involved).
pub async fn register_walkin(
    State(ctx): State<ApiContext>,
    Json(req): Json<WalkInRequest>,
) -> Result<(StatusCode, Json<WalkInResponse>), ApiError> {
    let outcome = ctx.orchestrator.register(RegisterPatient {
        name: req.name,
        phone: req.phone,
        reason: req.reason,
        urgency: req.urgency,
    })?;
    let message = format!(
        "Walk-in Token #{:03} registered successfully.",
        outcome.token_number
    );
    Ok((StatusCode::CREATED, Json(WalkInResponse { outcome, message })))
}

#[derive(Debug, Deserialize)]
pub struct EmergencyRequest {
    pub name: String,
    pub phone: String,
    pub reason: String,
}

#[derive(Serialize)]
pub struct EmergencyResponse {
    #[serde(flatten)]
    pub outcome: RegistrationOutcome,
    pub message: String,
}

/// `POST /api/staff/add-emergency` — register with urgency forced to the
/// maximum; the queue is rebalanced so the arrival lands on top.
pub async fn add_emergency(
    State(ctx): State<ApiContext>,
    Json(req): Json<EmergencyRequest>,
) -> Result<(StatusCode, Json<EmergencyResponse>), ApiError> {
    let outcome = ctx
        .orchestrator
        .register_emergency(req.name, req.phone, req.reason)?;
    let message = format!(
        "Emergency Token #{:03} added — queue reshuffled.",
        outcome.token_number
    );
    Ok((
        StatusCode::CREATED,
        Json(EmergencyResponse { outcome, message }),
    ))
}

#[derive(Serialize)]
pub struct NoShowResponse {
    #[serde(flatten)]
    pub marked: NoShowMarked,
    pub message: String,
}

/// `POST /api/staff/mark-noshow/:patient_id` — terminal no-show; frees
/// and credits the doctor if the patient was mid-consultation.
pub async fn mark_noshow(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<NoShowResponse>, ApiError> {
    let marked = ctx.orchestrator.mark_no_show(&patient_id)?;
    let message = format!("Token #{:03} marked as NO-SHOW", marked.token_number);
    Ok(Json(NoShowResponse { marked, message }))
}

#[derive(Debug, Deserialize)]
pub struct ToggleDoctorRequest {
    pub is_active: Option<bool>,
    pub is_on_break: Option<bool>,
}

#[derive(Serialize)]
pub struct ToggleDoctorResponse {
    #[serde(flatten)]
    pub toggled: DoctorToggled,
    pub message: String,
}

/// `PUT /api/staff/toggle-doctor/:doctor_id` — update availability
/// flags; waiting patients are reassigned and an interrupted
/// consultation is handed over or closed.
pub async fn toggle_doctor(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<Uuid>,
    Json(req): Json<ToggleDoctorRequest>,
) -> Result<Json<ToggleDoctorResponse>, ApiError> {
    let toggled = ctx
        .orchestrator
        .toggle_doctor(&doctor_id, req.is_active, req.is_on_break)?;
    let message = format!("{} status updated successfully.", toggled.doctor.name);
    Ok(Json(ToggleDoctorResponse { toggled, message }))
}

#[derive(Serialize)]
pub struct RebalanceResponse {
    #[serde(flatten)]
    pub outcome: RebalanceOutcome,
    pub message: String,
}

/// `POST /api/staff/rebalance` — force a full recalculation after bulk
/// changes.
pub async fn rebalance(
    State(ctx): State<ApiContext>,
) -> Result<Json<RebalanceResponse>, ApiError> {
    let outcome = ctx.orchestrator.rebalance()?;
    let message = format!(
        "Queue rebalanced successfully. {} patients re-scored.",
        outcome.rescored
    );
    Ok(Json(RebalanceResponse { outcome, message }))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
}

/// `GET /api/staff/logs` — recent audit events, newest first.
pub async fn logs(
    State(ctx): State<ApiContext>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(ctx.orchestrator.recent_events(limit)?))
}
