//! Queue orchestration — every state-changing operation routes through here.
//!
//! Each operation acquires the store lock, runs its mutation set inside
//! one SQLite transaction (commit-or-rollback as a unit), applies
//! priority-index updates after the commit, and finally publishes
//! observer events (best-effort).
//!
//! Patient status transitions:
//! `WAITING → IN_CONSULTATION → COMPLETED`, or
//! `WAITING | IN_CONSULTATION → NO_SHOW`. Terminal states never
//! transition again.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::allocation;
use crate::db::repository as repo;
use crate::db::DatabaseError;
use crate::models::{Doctor, Patient, PatientStatus};
use crate::notify::{Notifier, QueueEvent};
use crate::priority_index::PriorityIndex;
use crate::scoring;
use crate::tokens::TokenCounter;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

pub const URGENCY_MIN: i64 = 1;
pub const URGENCY_MAX: i64 = 10;

/// A skip lowers effective urgency by this much (floored at 1)...
const SKIP_URGENCY_PENALTY: i64 = 2;
/// ...and the resulting score is then halved and floored. The penalty is
/// transient: it lives only in the index and is washed out by the next
/// full recalculation, so repeated skips compound through wait time
/// alone, not through repeated urgency cuts.
const SKIP_SCORE_FACTOR: f64 = 0.5;
const SKIP_SCORE_FLOOR: f64 = 0.1;

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

/// Failure taxonomy for queue operations. Validation/NotFound/
/// InvalidState are caller mistakes and never retried; `Store` is the
/// transient-infrastructure class.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Request / result types
// ═══════════════════════════════════════════════════════════

/// Registration input, after urgency has been resolved (classifier or
/// staff-supplied).
#[derive(Debug, Clone)]
pub struct RegisterPatient {
    pub name: String,
    pub phone: String,
    pub reason: String,
    pub urgency: i64,
}

/// One row of the live queue view.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub token_number: i64,
    pub name: String,
    pub reason: String,
    pub urgency: i64,
    pub status: PatientStatus,
    pub assigned_doctor_id: Option<Uuid>,
    pub assigned_doctor_name: Option<String>,
    pub created_at: DateTime<Utc>,
    /// 1-based rank for WAITING patients, 0 for those in consultation.
    pub queue_position: i64,
    pub estimated_wait_minutes: i64,
    pub priority_score: f64,
}

/// Live counters for the day.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub in_queue: i64,
    pub in_consultation: i64,
    pub completed_today: i64,
    pub no_shows_today: i64,
    pub avg_wait_minutes: i64,
    pub total_today: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub patient: Patient,
    pub token_number: i64,
    pub queue_position: i64,
    pub estimated_wait_minutes: i64,
    pub priority_score: f64,
    pub assigned_doctor_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsultationStarted {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub token_number: i64,
    pub consultation_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsultationCompleted {
    pub completed_patient_id: Uuid,
    pub token_number: i64,
    /// Patient auto-assigned to the freed doctor, if any. Assignment is
    /// not a consultation start.
    pub next_patient_id: Option<Uuid>,
    pub consulted_today: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientSkipped {
    pub patient_id: Uuid,
    pub token_number: i64,
    pub new_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoShowMarked {
    pub patient_id: Uuid,
    pub token_number: i64,
    pub freed_doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorToggled {
    pub doctor: Doctor,
    pub is_available: bool,
    /// WAITING patients moved off this doctor.
    pub reassigned_patients: Vec<Uuid>,
    /// Doctor who took over an in-progress consultation, if any.
    pub handed_over_to: Option<Uuid>,
    /// Patient whose consultation was closed as no-show because nobody
    /// could take over.
    pub closed_no_show: Option<Uuid>,
    /// Patient auto-assigned after the doctor came back.
    pub assigned_next: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebalanceOutcome {
    pub rescored: usize,
    pub queue_length: usize,
}

/// Patient record enriched with live queue placement.
#[derive(Debug, Clone, Serialize)]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: Patient,
    pub assigned_doctor_name: Option<String>,
    pub queue_position: Option<i64>,
    pub estimated_wait_minutes: Option<i64>,
}

/// Doctor record enriched for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorOverview {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub is_active: bool,
    pub is_on_break: bool,
    pub is_available: bool,
    pub current_patient_id: Option<Uuid>,
    pub current_patient_token: Option<i64>,
    pub consulted_today: i64,
}

// ═══════════════════════════════════════════════════════════
// Orchestrator
// ═══════════════════════════════════════════════════════════

/// Owns the store, the live index, the token counter, and the notifier.
/// Constructed once at startup and shared behind `Arc`; the request path
/// and the background driver invoke the same methods.
pub struct QueueOrchestrator {
    store: Mutex<Connection>,
    index: PriorityIndex,
    tokens: TokenCounter,
    notifier: Notifier,
    avg_consult_minutes: i64,
}

impl QueueOrchestrator {
    /// Wire up the orchestrator: resume today's token numbering from the
    /// store and rebuild the index from WAITING rows, so a restart
    /// mid-day reconstructs the live queue.
    pub fn new(
        conn: Connection,
        notifier: Notifier,
        avg_consult_minutes: i64,
    ) -> Result<Self, QueueError> {
        let last_token = repo::max_token_since(&conn, start_of_day(Utc::now()))?;
        let orchestrator = Self {
            store: Mutex::new(conn),
            index: PriorityIndex::new(),
            tokens: TokenCounter::starting_at(last_token),
            notifier,
            avg_consult_minutes,
        };
        orchestrator.recalculate_all()?;
        Ok(orchestrator)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.store.lock().map_err(|_| QueueError::LockPoisoned)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    // ── Registration ────────────────────────────────────────

    /// Register a patient: issue a token, persist in WAITING, attempt a
    /// doctor assignment (no consultation start), insert into the index,
    /// and report rank + estimated wait.
    pub fn register(&self, req: RegisterPatient) -> Result<RegistrationOutcome, QueueError> {
        validate_registration(&req)?;
        let now = Utc::now();

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::from)?;

        let token = self.tokens.next_token();
        let mut patient = Patient::new(token, req.name, req.phone, req.reason, req.urgency, now);
        repo::insert_patient(&tx, &patient)?;

        let assigned = allocation::pick_optimal_doctor(&tx)?;
        if let Some(doctor) = &assigned {
            allocation::assign_doctor(&tx, &patient.id, &doctor.id)?;
            patient.assigned_doctor_id = Some(doctor.id);
        }

        let meta = serde_json::json!({ "token": token, "urgency": patient.urgency });
        repo::insert_event(&tx, "patient_registered", Some(&patient.id), Some(&meta))?;
        tx.commit().map_err(DatabaseError::from)?;

        // New registrations score with doctor_load 0; recalculation
        // folds in load later.
        let score = scoring::compute_priority(patient.urgency, patient.created_at, now, 0.0);
        self.index.upsert(patient.id, score);
        let position = self
            .index
            .rank(&patient.id)
            .unwrap_or(self.index.len() as i64);
        let wait = scoring::estimate_wait_minutes(position, self.avg_consult_minutes);

        tracing::info!(token, urgency = patient.urgency, position, "Patient registered");
        self.publish_full_update_with(&conn);

        Ok(RegistrationOutcome {
            token_number: token,
            queue_position: position,
            estimated_wait_minutes: wait,
            priority_score: score,
            assigned_doctor_name: assigned.map(|d| d.name),
            patient,
        })
    }

    /// Staff shortcut: register with urgency forced to the maximum and
    /// rebalance so the new arrival takes its place at the top.
    pub fn register_emergency(
        &self,
        name: String,
        phone: String,
        reason: String,
    ) -> Result<RegistrationOutcome, QueueError> {
        let mut outcome = self.register(RegisterPatient {
            name,
            phone,
            reason,
            urgency: URGENCY_MAX,
        })?;

        let conn = self.conn()?;
        let meta = serde_json::json!({ "token": outcome.token_number, "urgency": URGENCY_MAX });
        repo::insert_event(&conn, "emergency_added", Some(&outcome.patient.id), Some(&meta))?;
        self.recalculate_with(&conn)?;

        outcome.queue_position = self
            .index
            .rank(&outcome.patient.id)
            .unwrap_or(outcome.queue_position);
        outcome.estimated_wait_minutes =
            scoring::estimate_wait_minutes(outcome.queue_position, self.avg_consult_minutes);

        self.notifier.publish(QueueEvent::EmergencyAdded {
            patient_id: outcome.patient.id,
            token_number: outcome.token_number,
            name: outcome.patient.name.clone(),
            urgency: URGENCY_MAX,
        });
        self.publish_full_update_with(&conn);
        Ok(outcome)
    }

    // ── Consultation lifecycle ──────────────────────────────

    /// Doctor calls a waiting patient in.
    pub fn start_consultation(
        &self,
        doctor_id: &Uuid,
        patient_id: &Uuid,
    ) -> Result<ConsultationStarted, QueueError> {
        let now = Utc::now();
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::from)?;

        let doctor = repo::get_doctor(&tx, doctor_id)?
            .ok_or_else(|| QueueError::NotFound("Doctor not found".into()))?;
        let patient = repo::get_patient(&tx, patient_id)?
            .ok_or_else(|| QueueError::NotFound("Patient not found".into()))?;

        if patient.status != PatientStatus::Waiting {
            return Err(QueueError::InvalidState(format!(
                "Patient is not waiting (current: {})",
                patient.status.as_str()
            )));
        }
        if let Some(current) = doctor.current_patient_id {
            return Err(QueueError::InvalidState(format!(
                "Doctor already has patient {current} in consultation"
            )));
        }

        allocation::start_consultation(&tx, &doctor.id, &patient.id, now)?;
        let meta = serde_json::json!({ "doctor_id": doctor.id, "token": patient.token_number });
        repo::insert_event(&tx, "consultation_started", Some(&patient.id), Some(&meta))?;
        tx.commit().map_err(DatabaseError::from)?;

        self.index.remove(&patient.id);

        self.notifier.publish(QueueEvent::PatientStatusChanged {
            patient_id: patient.id,
            token_number: patient.token_number,
            status: PatientStatus::InConsultation,
            doctor_name: Some(doctor.name.clone()),
        });
        self.publish_full_update_with(&conn);

        Ok(ConsultationStarted {
            patient_id: patient.id,
            doctor_id: doctor.id,
            token_number: patient.token_number,
            consultation_start: now,
        })
    }

    /// Doctor finishes the current consultation; the freed chair pulls
    /// the next highest-priority unassigned patient (assignment only).
    pub fn complete_consultation(
        &self,
        doctor_id: &Uuid,
    ) -> Result<ConsultationCompleted, QueueError> {
        let now = Utc::now();
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::from)?;

        let doctor = repo::get_doctor(&tx, doctor_id)?
            .ok_or_else(|| QueueError::NotFound("Doctor not found".into()))?;
        let current_id = doctor.current_patient_id.ok_or_else(|| {
            QueueError::InvalidState("Doctor has no current patient".into())
        })?;
        let patient = repo::get_patient(&tx, &current_id)?.ok_or_else(|| {
            QueueError::InvalidState("Doctor's current patient record is missing".into())
        })?;

        allocation::complete_consultation(&tx, &doctor.id, &patient.id, now)?;
        let consulted_today = doctor.consulted_today + 1;
        let meta = serde_json::json!({
            "doctor_id": doctor.id,
            "token": patient.token_number,
            "consulted_today": consulted_today,
        });
        repo::insert_event(&tx, "consultation_completed", Some(&patient.id), Some(&meta))?;

        let next = allocation::auto_assign_next(&tx, &self.index, &doctor.id)?;
        tx.commit().map_err(DatabaseError::from)?;

        self.notifier.publish(QueueEvent::PatientStatusChanged {
            patient_id: patient.id,
            token_number: patient.token_number,
            status: PatientStatus::Completed,
            doctor_name: None,
        });
        self.notifier.publish(QueueEvent::DoctorStatusChanged {
            doctor_id: doctor.id,
            doctor_name: doctor.name.clone(),
            is_active: doctor.is_active,
            is_on_break: doctor.is_on_break,
            current_patient_id: None,
        });
        self.publish_full_update_with(&conn);

        Ok(ConsultationCompleted {
            completed_patient_id: patient.id,
            token_number: patient.token_number,
            next_patient_id: next.map(|p| p.id),
            consulted_today,
        })
    }

    // ── Queue adjustments ───────────────────────────────────

    /// Defer a waiting patient: requeue with a transiently lowered score.
    /// The stored urgency is untouched.
    pub fn skip_patient(&self, patient_id: &Uuid) -> Result<PatientSkipped, QueueError> {
        let now = Utc::now();
        let conn = self.conn()?;

        let patient = repo::get_patient(&conn, patient_id)?
            .ok_or_else(|| QueueError::NotFound("Patient not found".into()))?;
        if patient.status != PatientStatus::Waiting {
            return Err(QueueError::InvalidState(
                "Only a waiting patient can be skipped".into(),
            ));
        }

        let reduced_urgency = (patient.urgency - SKIP_URGENCY_PENALTY).max(URGENCY_MIN);
        let base = scoring::compute_priority(reduced_urgency, patient.created_at, now, 0.0);
        let new_score = scoring::round4((base * SKIP_SCORE_FACTOR).max(SKIP_SCORE_FLOOR));

        let meta = serde_json::json!({ "token": patient.token_number, "new_score": new_score });
        repo::insert_event(&conn, "patient_skipped", Some(&patient.id), Some(&meta))?;

        self.index.upsert(patient.id, new_score);
        tracing::debug!(token = patient.token_number, new_score, "Patient skipped");
        self.publish_full_update_with(&conn);

        Ok(PatientSkipped {
            patient_id: patient.id,
            token_number: patient.token_number,
            new_score,
        })
    }

    /// Permanently raise a patient to maximum urgency and rebalance the
    /// whole queue.
    pub fn flag_emergency(&self, patient_id: &Uuid) -> Result<PatientDetail, QueueError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::from)?;

        let patient = repo::get_patient(&tx, patient_id)?
            .ok_or_else(|| QueueError::NotFound("Patient not found".into()))?;
        repo::set_patient_urgency(&tx, &patient.id, URGENCY_MAX)?;
        let meta = serde_json::json!({ "token": patient.token_number });
        repo::insert_event(&tx, "emergency_flagged", Some(&patient.id), Some(&meta))?;
        tx.commit().map_err(DatabaseError::from)?;

        self.recalculate_with(&conn)?;

        self.notifier.publish(QueueEvent::EmergencyAdded {
            patient_id: patient.id,
            token_number: patient.token_number,
            name: patient.name.clone(),
            urgency: URGENCY_MAX,
        });
        self.publish_full_update_with(&conn);

        self.patient_detail_with(&conn, patient_id)
    }

    /// Mark a patient who never showed (or walked out mid-consultation).
    /// An interrupted consultation frees and credits the doctor.
    pub fn mark_no_show(&self, patient_id: &Uuid) -> Result<NoShowMarked, QueueError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::from)?;

        let patient = repo::get_patient(&tx, patient_id)?
            .ok_or_else(|| QueueError::NotFound("Patient not found".into()))?;
        if patient.status.is_terminal() {
            return Err(QueueError::InvalidState(format!(
                "Patient already in terminal status: {}",
                patient.status.as_str()
            )));
        }

        let mut freed_doctor: Option<Doctor> = None;
        if patient.status == PatientStatus::InConsultation {
            if let Some(doctor_id) = patient.assigned_doctor_id {
                if let Some(doctor) = repo::get_doctor(&tx, &doctor_id)? {
                    if doctor.current_patient_id == Some(patient.id) {
                        repo::set_doctor_current_patient(&tx, &doctor.id, None)?;
                        repo::increment_doctor_consulted(&tx, &doctor.id)?;
                        freed_doctor = Some(doctor);
                    }
                }
            }
        }

        repo::set_patient_status(&tx, &patient.id, PatientStatus::NoShow)?;
        let meta = serde_json::json!({ "token": patient.token_number });
        repo::insert_event(&tx, "patient_noshow", Some(&patient.id), Some(&meta))?;
        tx.commit().map_err(DatabaseError::from)?;

        self.index.remove(&patient.id);

        self.notifier.publish(QueueEvent::PatientStatusChanged {
            patient_id: patient.id,
            token_number: patient.token_number,
            status: PatientStatus::NoShow,
            doctor_name: None,
        });
        if let Some(doctor) = &freed_doctor {
            self.notifier.publish(QueueEvent::DoctorStatusChanged {
                doctor_id: doctor.id,
                doctor_name: doctor.name.clone(),
                is_active: doctor.is_active,
                is_on_break: doctor.is_on_break,
                current_patient_id: None,
            });
        }
        self.publish_full_update_with(&conn);

        Ok(NoShowMarked {
            patient_id: patient.id,
            token_number: patient.token_number,
            freed_doctor_id: freed_doctor.map(|d| d.id),
        })
    }

    // ── Doctor administration ───────────────────────────────

    pub fn create_doctor(
        &self,
        name: String,
        specialization: String,
    ) -> Result<Doctor, QueueError> {
        if name.trim().is_empty() {
            return Err(QueueError::Validation("Doctor name must not be empty".into()));
        }
        let specialization = if specialization.trim().is_empty() {
            "General Medicine".to_string()
        } else {
            specialization
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::from)?;
        let doctor = Doctor::new(name, specialization);
        repo::insert_doctor(&tx, &doctor)?;
        repo::insert_event(&tx, "doctor_created", Some(&doctor.id), None)?;
        tx.commit().map_err(DatabaseError::from)?;
        Ok(doctor)
    }

    /// Update a doctor's availability flags.
    ///
    /// Going off duty reassigns their WAITING patients. If they were
    /// mid-consultation, the consultation is handed to the best other
    /// available doctor; with nobody free it is closed through the
    /// no-show path (doctor credited) — a patient is never left
    /// IN_CONSULTATION without an active doctor. Coming back on duty
    /// pulls the next unassigned patient from the queue.
    pub fn toggle_doctor(
        &self,
        doctor_id: &Uuid,
        is_active: Option<bool>,
        is_on_break: Option<bool>,
    ) -> Result<DoctorToggled, QueueError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::from)?;

        let mut doctor = repo::get_doctor(&tx, doctor_id)?
            .ok_or_else(|| QueueError::NotFound("Doctor not found".into()))?;
        let was_available = doctor.is_available();

        if let Some(active) = is_active {
            doctor.is_active = active;
        }
        if let Some(on_break) = is_on_break {
            doctor.is_on_break = on_break;
        }
        repo::set_doctor_flags(&tx, &doctor.id, doctor.is_active, doctor.is_on_break)?;

        let off_duty = !doctor.is_active || doctor.is_on_break;
        let mut reassigned = Vec::new();
        let mut handed_over_to = None;
        let mut closed_no_show = None;
        let mut assigned_next = None;

        if off_duty {
            reassigned = allocation::reassign_waiting(&tx, &doctor.id)?;

            if let Some(patient_id) = doctor.current_patient_id {
                match allocation::pick_optimal_doctor_excluding(&tx, &doctor.id)? {
                    Some(other) => {
                        repo::set_doctor_current_patient(&tx, &other.id, Some(&patient_id))?;
                        repo::set_patient_assignment(&tx, &patient_id, Some(&other.id))?;
                        handed_over_to = Some(other.id);
                        tracing::info!(
                            from = %doctor.name,
                            to = %other.name,
                            "Consultation handed over"
                        );
                    }
                    None => {
                        repo::set_patient_status(&tx, &patient_id, PatientStatus::NoShow)?;
                        repo::increment_doctor_consulted(&tx, &doctor.id)?;
                        closed_no_show = Some(patient_id);
                        tracing::warn!(
                            doctor = %doctor.name,
                            %patient_id,
                            "No doctor free to take over; consultation closed as no-show"
                        );
                    }
                }
                repo::set_doctor_current_patient(&tx, &doctor.id, None)?;
                doctor.current_patient_id = None;
            }
        } else if !was_available && doctor.is_available() {
            assigned_next =
                allocation::auto_assign_next(&tx, &self.index, &doctor.id)?.map(|p| p.id);
        }

        let meta = serde_json::json!({
            "is_active": doctor.is_active,
            "is_on_break": doctor.is_on_break,
            "reassigned_patients": reassigned,
        });
        repo::insert_event(&tx, "doctor_toggled", Some(&doctor.id), Some(&meta))?;
        tx.commit().map_err(DatabaseError::from)?;

        if let Some(patient_id) = closed_no_show {
            self.index.remove(&patient_id);
        }

        self.notifier.publish(QueueEvent::DoctorStatusChanged {
            doctor_id: doctor.id,
            doctor_name: doctor.name.clone(),
            is_active: doctor.is_active,
            is_on_break: doctor.is_on_break,
            current_patient_id: doctor.current_patient_id,
        });
        self.publish_full_update_with(&conn);

        let is_available = doctor.is_available();
        Ok(DoctorToggled {
            doctor,
            is_available,
            reassigned_patients: reassigned,
            handed_over_to,
            closed_no_show,
            assigned_next,
        })
    }

    // ── Recalculation ───────────────────────────────────────

    /// Re-score every WAITING patient against a single clock reading and
    /// prune index entries whose patients are no longer waiting.
    /// Idempotent; overlapping runs converge (last write wins per id).
    pub fn recalculate_all(&self) -> Result<usize, QueueError> {
        let conn = self.conn()?;
        self.recalculate_with(&conn)
    }

    fn recalculate_with(&self, conn: &Connection) -> Result<usize, QueueError> {
        let now = Utc::now();
        let waiting = repo::patients_by_status(conn, PatientStatus::Waiting)?;
        let doctors = repo::list_doctors(conn)?;
        let max_consulted = doctors
            .iter()
            .map(|d| d.consulted_today)
            .max()
            .unwrap_or(0)
            .max(1);

        for patient in &waiting {
            let doctor_load = patient
                .assigned_doctor_id
                .and_then(|id| doctors.iter().find(|d| d.id == id))
                .map(|d| 1.0 - d.consulted_today as f64 / max_consulted as f64)
                .unwrap_or(0.0);
            let score = scoring::compute_priority(patient.urgency, patient.created_at, now, doctor_load);
            self.index.upsert(patient.id, score);
        }

        let waiting_ids: HashSet<Uuid> = waiting.iter().map(|p| p.id).collect();
        for (id, _) in self.index.snapshot() {
            if !waiting_ids.contains(&id) {
                self.index.remove(&id);
            }
        }

        Ok(waiting.len())
    }

    /// One driver cycle: recalculate, then push a full snapshot to
    /// observers. Errors propagate so the driver can retry.
    pub fn recalculate_and_publish(&self) -> Result<usize, QueueError> {
        let conn = self.conn()?;
        let rescored = self.recalculate_with(&conn)?;
        let queue = self.assemble_queue(&conn)?;
        let stats = self.assemble_stats(&conn)?;
        self.notifier.publish(QueueEvent::QueueUpdated { queue, stats });
        Ok(rescored)
    }

    /// Administrative full rebalance after bulk changes.
    pub fn rebalance(&self) -> Result<RebalanceOutcome, QueueError> {
        let conn = self.conn()?;
        let rescored = self.recalculate_with(&conn)?;
        repo::insert_event(&conn, "queue_rebalanced", None, None)?;
        self.publish_full_update_with(&conn);
        Ok(RebalanceOutcome {
            rescored,
            queue_length: self.index.len(),
        })
    }

    /// Daily reset: doctor counters zeroed transactionally; only on
    /// commit do the token counter and live index reset. Patient history
    /// rows are preserved.
    pub fn daily_reset(&self) -> Result<(), QueueError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::from)?;
        let doctors_reset = repo::reset_doctor_daily_counts(&tx)?;
        let meta = serde_json::json!({ "doctors_reset": doctors_reset });
        repo::insert_event(&tx, "daily_reset", None, Some(&meta))?;
        tx.commit().map_err(DatabaseError::from)?;

        self.tokens.reset();
        self.index.clear();
        tracing::info!(doctors_reset, "Daily counters reset");
        self.publish_full_update_with(&conn);
        Ok(())
    }

    // ── Read side ───────────────────────────────────────────

    /// Ranked WAITING patients followed by those in consultation
    /// (position 0, for the doctor view).
    pub fn queue_view(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let conn = self.conn()?;
        self.assemble_queue(&conn)
    }

    pub fn stats(&self) -> Result<QueueStats, QueueError> {
        let conn = self.conn()?;
        self.assemble_stats(&conn)
    }

    pub fn patient_detail(&self, patient_id: &Uuid) -> Result<PatientDetail, QueueError> {
        let conn = self.conn()?;
        self.patient_detail_with(&conn, patient_id)
    }

    pub fn doctors_overview(&self) -> Result<Vec<DoctorOverview>, QueueError> {
        let conn = self.conn()?;
        let doctors = repo::list_doctors(&conn)?;
        let mut overview = Vec::with_capacity(doctors.len());
        for doctor in doctors {
            let current_patient_token = match doctor.current_patient_id {
                Some(patient_id) => {
                    repo::get_patient(&conn, &patient_id)?.map(|p| p.token_number)
                }
                None => None,
            };
            let is_available = doctor.is_available();
            overview.push(DoctorOverview {
                id: doctor.id,
                name: doctor.name,
                specialization: doctor.specialization,
                is_active: doctor.is_active,
                is_on_break: doctor.is_on_break,
                is_available,
                current_patient_id: doctor.current_patient_id,
                current_patient_token,
                consulted_today: doctor.consulted_today,
            });
        }
        Ok(overview)
    }

    pub fn recent_events(&self, limit: i64) -> Result<Vec<crate::models::EventRecord>, QueueError> {
        let conn = self.conn()?;
        Ok(repo::recent_events(&conn, limit)?)
    }

    fn patient_detail_with(
        &self,
        conn: &Connection,
        patient_id: &Uuid,
    ) -> Result<PatientDetail, QueueError> {
        let patient = repo::get_patient(conn, patient_id)?
            .ok_or_else(|| QueueError::NotFound("Patient not found".into()))?;
        let assigned_doctor_name = match patient.assigned_doctor_id {
            Some(doctor_id) => repo::get_doctor(conn, &doctor_id)?.map(|d| d.name),
            None => None,
        };
        let queue_position = self.index.rank(&patient.id);
        let estimated_wait_minutes = queue_position
            .map(|pos| scoring::estimate_wait_minutes(pos, self.avg_consult_minutes));
        Ok(PatientDetail {
            patient,
            assigned_doctor_name,
            queue_position,
            estimated_wait_minutes,
        })
    }

    fn assemble_queue(&self, conn: &Connection) -> Result<Vec<QueueEntry>, QueueError> {
        let mut entries = Vec::new();
        let mut position = 0i64;

        for (id, score) in self.index.snapshot() {
            let Some(patient) = repo::get_patient(conn, &id)? else {
                continue;
            };
            if patient.status != PatientStatus::Waiting {
                continue;
            }
            position += 1;
            let assigned_doctor_name = match patient.assigned_doctor_id {
                Some(doctor_id) => repo::get_doctor(conn, &doctor_id)?.map(|d| d.name),
                None => None,
            };
            entries.push(QueueEntry {
                id: patient.id,
                token_number: patient.token_number,
                name: patient.name,
                reason: patient.reason,
                urgency: patient.urgency,
                status: patient.status,
                assigned_doctor_id: patient.assigned_doctor_id,
                assigned_doctor_name,
                created_at: patient.created_at,
                queue_position: position,
                estimated_wait_minutes: scoring::estimate_wait_minutes(
                    position,
                    self.avg_consult_minutes,
                ),
                priority_score: score,
            });
        }

        for patient in repo::patients_by_status(conn, PatientStatus::InConsultation)? {
            let assigned_doctor_name = match patient.assigned_doctor_id {
                Some(doctor_id) => repo::get_doctor(conn, &doctor_id)?.map(|d| d.name),
                None => None,
            };
            entries.push(QueueEntry {
                id: patient.id,
                token_number: patient.token_number,
                name: patient.name,
                reason: patient.reason,
                urgency: patient.urgency,
                status: patient.status,
                assigned_doctor_id: patient.assigned_doctor_id,
                assigned_doctor_name,
                created_at: patient.created_at,
                queue_position: 0,
                estimated_wait_minutes: 0,
                priority_score: 0.0,
            });
        }

        Ok(entries)
    }

    fn assemble_stats(&self, conn: &Connection) -> Result<QueueStats, QueueError> {
        let counts = repo::patient_status_counts(conn)?;
        let get = |status: PatientStatus| counts.get(&status).copied().unwrap_or(0);
        let in_queue = get(PatientStatus::Waiting);
        let in_consultation = get(PatientStatus::InConsultation);
        let completed_today = get(PatientStatus::Completed);
        let no_shows_today = get(PatientStatus::NoShow);

        let queue_len = self.index.len() as i64;
        let avg_wait_minutes = if queue_len > 0 {
            scoring::estimate_wait_minutes((queue_len / 2).max(1), self.avg_consult_minutes)
        } else {
            0
        };

        Ok(QueueStats {
            in_queue,
            in_consultation,
            completed_today,
            no_shows_today,
            avg_wait_minutes,
            total_today: in_queue + in_consultation + completed_today + no_shows_today,
        })
    }

    /// Best-effort snapshot broadcast; a failure to assemble is logged,
    /// never surfaced to the triggering operation.
    fn publish_full_update_with(&self, conn: &Connection) {
        let assembled = self
            .assemble_queue(conn)
            .and_then(|queue| Ok((queue, self.assemble_stats(conn)?)));
        match assembled {
            Ok((queue, stats)) => self.notifier.publish(QueueEvent::QueueUpdated { queue, stats }),
            Err(e) => tracing::warn!("Failed to assemble queue snapshot: {e}"),
        }
    }
}

fn validate_registration(req: &RegisterPatient) -> Result<(), QueueError> {
    if req.name.trim().is_empty() {
        return Err(QueueError::Validation("Name must not be empty".into()));
    }
    if req.phone.trim().is_empty() {
        return Err(QueueError::Validation("Phone must not be empty".into()));
    }
    if req.reason.trim().is_empty() {
        return Err(QueueError::Validation("Reason must not be empty".into()));
    }
    if !(URGENCY_MIN..=URGENCY_MAX).contains(&req.urgency) {
        return Err(QueueError::Validation(format!(
            "Urgency must be between {URGENCY_MIN} and {URGENCY_MAX}"
        )));
    }
    Ok(())
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now)
}
