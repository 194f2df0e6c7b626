//! Doctor assignment and consultation transitions.
//!
//! Free functions over a borrowed connection so every caller composes
//! them inside its own transaction. The orchestrator owns sequencing
//! and event emission; nothing here touches the priority index except
//! the read-only scan in [`auto_assign_next`].

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{
    available_doctors, begin_patient_consultation, finish_patient_consultation, get_patient,
    increment_doctor_consulted, set_doctor_current_patient, set_patient_assignment,
    waiting_patients_assigned_to,
};
use crate::db::DatabaseError;
use crate::models::{Doctor, Patient, PatientStatus};
use crate::priority_index::PriorityIndex;

/// Best available doctor: fewest consultations today, ties by lowest id.
pub fn pick_optimal_doctor(conn: &Connection) -> Result<Option<Doctor>, DatabaseError> {
    Ok(available_doctors(conn, None)?.into_iter().next())
}

/// Same selection with one doctor removed from consideration.
pub fn pick_optimal_doctor_excluding(
    conn: &Connection,
    exclude: &Uuid,
) -> Result<Option<Doctor>, DatabaseError> {
    Ok(available_doctors(conn, Some(exclude))?.into_iter().next())
}

/// Point the patient at a doctor. No other side effect — assignment is
/// a routing hint, not a consultation.
pub fn assign_doctor(
    conn: &Connection,
    patient_id: &Uuid,
    doctor_id: &Uuid,
) -> Result<(), DatabaseError> {
    set_patient_assignment(conn, patient_id, Some(doctor_id))
}

/// Begin a consultation: link both sides and stamp the start time.
/// Leaves the invariant `doctor.current_patient set ⇒ patient
/// IN_CONSULTATION and back-linked` true on commit.
pub fn start_consultation(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    set_doctor_current_patient(conn, doctor_id, Some(patient_id))?;
    set_patient_assignment(conn, patient_id, Some(doctor_id))?;
    begin_patient_consultation(conn, patient_id, now)
}

/// Finish a consultation: patient COMPLETED, chair freed, daily count
/// credited.
pub fn complete_consultation(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    finish_patient_consultation(conn, patient_id, now)?;
    set_doctor_current_patient(conn, doctor_id, None)?;
    increment_doctor_consulted(conn, doctor_id)
}

/// Walk the index snapshot in priority order and assign the first
/// patient who is still WAITING and unassigned to any doctor.
///
/// The index can lag the store (a patient may have been called or
/// marked no-show since the snapshot), so each candidate is re-read
/// from the store before assignment — the index alone is never trusted.
pub fn auto_assign_next(
    conn: &Connection,
    index: &PriorityIndex,
    doctor_id: &Uuid,
) -> Result<Option<Patient>, DatabaseError> {
    for (candidate_id, _score) in index.snapshot() {
        let Some(mut patient) = get_patient(conn, &candidate_id)? else {
            continue;
        };
        if patient.status != PatientStatus::Waiting || patient.assigned_doctor_id.is_some() {
            continue;
        }
        assign_doctor(conn, &patient.id, doctor_id)?;
        patient.assigned_doctor_id = Some(*doctor_id);
        return Ok(Some(patient));
    }
    Ok(None)
}

/// Reassign every WAITING patient pointed at `doctor_id` to the next
/// best doctor, or clear the assignment when no one is free. Returns
/// the affected patient ids.
pub fn reassign_waiting(conn: &Connection, doctor_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
    let patients = waiting_patients_assigned_to(conn, doctor_id)?;
    let mut affected = Vec::with_capacity(patients.len());

    for patient in patients {
        match pick_optimal_doctor_excluding(conn, doctor_id)? {
            Some(other) => set_patient_assignment(conn, &patient.id, Some(&other.id))?,
            None => set_patient_assignment(conn, &patient.id, None)?,
        }
        affected.push(patient.id);
    }
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{get_doctor, insert_doctor, insert_patient, set_doctor_flags};
    use crate::db::sqlite::open_memory_database;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn doctor(conn: &Connection, name: &str, consulted: i64) -> Doctor {
        let mut d = Doctor::new(name, "General Medicine");
        d.consulted_today = consulted;
        insert_doctor(conn, &d).unwrap();
        d
    }

    fn waiting_patient(conn: &Connection, token: i64, urgency: i64) -> Patient {
        let p = Patient::new(
            token,
            format!("Patient {token}"),
            "9876543210",
            "Fever / Cold",
            urgency,
            Utc::now(),
        );
        insert_patient(conn, &p).unwrap();
        p
    }

    #[test]
    fn optimal_doctor_prefers_least_consulted() {
        let conn = test_db();
        doctor(&conn, "Dr. Busy", 5);
        let rested = doctor(&conn, "Dr. Rested", 1);

        let picked = pick_optimal_doctor(&conn).unwrap().unwrap();
        assert_eq!(picked.id, rested.id);
    }

    #[test]
    fn optimal_doctor_none_when_all_unavailable() {
        let conn = test_db();
        let d = doctor(&conn, "Dr. Off", 0);
        set_doctor_flags(&conn, &d.id, false, false).unwrap();
        assert!(pick_optimal_doctor(&conn).unwrap().is_none());
    }

    #[test]
    fn start_then_complete_round_trip() {
        let conn = test_db();
        let d = doctor(&conn, "Dr. A", 0);
        let p = waiting_patient(&conn, 1, 5);

        start_consultation(&conn, &d.id, &p.id, Utc::now()).unwrap();
        let loaded_d = get_doctor(&conn, &d.id).unwrap().unwrap();
        let loaded_p = get_patient(&conn, &p.id).unwrap().unwrap();
        assert_eq!(loaded_d.current_patient_id, Some(p.id));
        assert_eq!(loaded_p.status, PatientStatus::InConsultation);
        assert_eq!(loaded_p.assigned_doctor_id, Some(d.id));
        assert!(loaded_p.consultation_start.is_some());

        complete_consultation(&conn, &d.id, &p.id, Utc::now()).unwrap();
        let loaded_d = get_doctor(&conn, &d.id).unwrap().unwrap();
        let loaded_p = get_patient(&conn, &p.id).unwrap().unwrap();
        assert!(loaded_d.current_patient_id.is_none());
        assert_eq!(loaded_d.consulted_today, 1);
        assert_eq!(loaded_p.status, PatientStatus::Completed);
        assert!(loaded_p.consultation_end.is_some());
    }

    #[test]
    fn auto_assign_skips_stale_index_entries() {
        let conn = test_db();
        let index = PriorityIndex::new();
        let d = doctor(&conn, "Dr. A", 0);

        let gone = waiting_patient(&conn, 1, 9);
        let taken = waiting_patient(&conn, 2, 8);
        let free = waiting_patient(&conn, 3, 4);
        index.upsert(gone.id, 9.0);
        index.upsert(taken.id, 8.0);
        index.upsert(free.id, 4.0);

        // `gone` left the queue, `taken` already belongs to another doctor;
        // the index has not caught up.
        crate::db::repository::set_patient_status(&conn, &gone.id, PatientStatus::NoShow).unwrap();
        let other = doctor(&conn, "Dr. B", 0);
        set_patient_assignment(&conn, &taken.id, Some(&other.id)).unwrap();

        let assigned = auto_assign_next(&conn, &index, &d.id).unwrap().unwrap();
        assert_eq!(assigned.id, free.id);
        assert_eq!(
            get_patient(&conn, &free.id).unwrap().unwrap().assigned_doctor_id,
            Some(d.id)
        );
    }

    #[test]
    fn auto_assign_none_on_empty_index() {
        let conn = test_db();
        let index = PriorityIndex::new();
        let d = doctor(&conn, "Dr. A", 0);
        assert!(auto_assign_next(&conn, &index, &d.id).unwrap().is_none());
    }

    #[test]
    fn reassign_moves_patients_to_other_doctor() {
        let conn = test_db();
        let leaving = doctor(&conn, "Dr. Leaving", 0);
        let stays = doctor(&conn, "Dr. Stays", 0);

        let p1 = waiting_patient(&conn, 1, 5);
        let p2 = waiting_patient(&conn, 2, 5);
        assign_doctor(&conn, &p1.id, &leaving.id).unwrap();
        assign_doctor(&conn, &p2.id, &leaving.id).unwrap();

        let affected = reassign_waiting(&conn, &leaving.id).unwrap();
        assert_eq!(affected.len(), 2);
        for id in [&p1.id, &p2.id] {
            assert_eq!(
                get_patient(&conn, id).unwrap().unwrap().assigned_doctor_id,
                Some(stays.id)
            );
        }
    }

    #[test]
    fn reassign_clears_when_no_doctor_left() {
        let conn = test_db();
        let leaving = doctor(&conn, "Dr. Only", 0);
        let p = waiting_patient(&conn, 1, 5);
        assign_doctor(&conn, &p.id, &leaving.id).unwrap();

        let affected = reassign_waiting(&conn, &leaving.id).unwrap();
        assert_eq!(affected, vec![p.id]);
        assert!(get_patient(&conn, &p.id)
            .unwrap()
            .unwrap()
            .assigned_doctor_id
            .is_none());
    }
}
