//! Doctor listing and consultation action endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::Doctor;
use crate::orchestrator::{
    ConsultationCompleted, ConsultationStarted, DoctorOverview, PatientDetail, PatientSkipped,
};

/// `GET /api/doctors` — all doctors with live status.
pub async fn list(
    State(ctx): State<ApiContext>,
) -> Result<Json<Vec<DoctorOverview>>, ApiError> {
    Ok(Json(ctx.orchestrator.doctors_overview()?))
}

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    #[serde(default)]
    pub specialization: String,
}

/// `POST /api/doctors` — create a doctor (admin use).
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Doctor>), ApiError> {
    let doctor = ctx.orchestrator.create_doctor(req.name, req.specialization)?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

#[derive(Debug, Deserialize)]
pub struct StartConsultationRequest {
    pub patient_id: Uuid,
}

#[derive(Serialize)]
pub struct StartConsultationResponse {
    #[serde(flatten)]
    pub started: ConsultationStarted,
    pub message: String,
}

/// `POST /api/doctors/:id/start-consultation` — call a waiting patient in.
pub async fn start_consultation(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<Uuid>,
    Json(req): Json<StartConsultationRequest>,
) -> Result<Json<StartConsultationResponse>, ApiError> {
    let started = ctx
        .orchestrator
        .start_consultation(&doctor_id, &req.patient_id)?;
    let message = format!("Consultation started for Token #{:03}", started.token_number);
    Ok(Json(StartConsultationResponse { started, message }))
}

#[derive(Serialize)]
pub struct CompleteConsultationResponse {
    #[serde(flatten)]
    pub completed: ConsultationCompleted,
    pub message: String,
}

/// `POST /api/doctors/:id/complete-consultation` — finish the current
/// consultation; the freed doctor pulls the next unassigned patient.
pub async fn complete_consultation(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<CompleteConsultationResponse>, ApiError> {
    let completed = ctx.orchestrator.complete_consultation(&doctor_id)?;
    let message = format!(
        "Consultation completed for Token #{:03}",
        completed.token_number
    );
    Ok(Json(CompleteConsultationResponse { completed, message }))
}

#[derive(Debug, Deserialize)]
pub struct SkipPatientRequest {
    pub patient_id: Uuid,
}

#[derive(Serialize)]
pub struct SkipPatientResponse {
    #[serde(flatten)]
    pub skipped: PatientSkipped,
    pub message: String,
}

/// `POST /api/doctors/:id/skip-patient` — requeue a missing patient at
/// a transiently lowered priority.
pub async fn skip_patient(
    State(ctx): State<ApiContext>,
    Path(_doctor_id): Path<Uuid>,
    Json(req): Json<SkipPatientRequest>,
) -> Result<Json<SkipPatientResponse>, ApiError> {
    let skipped = ctx.orchestrator.skip_patient(&req.patient_id)?;
    let message = format!(
        "Token #{:03} skipped and requeued at lower priority",
        skipped.token_number
    );
    Ok(Json(SkipPatientResponse { skipped, message }))
}

#[derive(Debug, Deserialize)]
pub struct FlagEmergencyRequest {
    pub patient_id: Uuid,
}

#[derive(Serialize)]
pub struct FlagEmergencyResponse {
    pub patient: PatientDetail,
    pub message: String,
}

/// `POST /api/doctors/:id/flag-emergency` — raise a patient to maximum
/// urgency and rebalance the queue.
pub async fn flag_emergency(
    State(ctx): State<ApiContext>,
    Path(_doctor_id): Path<Uuid>,
    Json(req): Json<FlagEmergencyRequest>,
) -> Result<Json<FlagEmergencyResponse>, ApiError> {
    let patient = ctx.orchestrator.flag_emergency(&req.patient_id)?;
    let message = format!(
        "Token #{:03} flagged as EMERGENCY — queue recalculated",
        patient.patient.token_number
    );
    Ok(Json(FlagEmergencyResponse { patient, message }))
}
