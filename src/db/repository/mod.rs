//! Repository layer — entity-scoped database operations.
//!
//! Free functions over `&rusqlite::Connection` so they compose inside a
//! single transaction owned by the caller. All public functions are
//! re-exported here.

mod doctor;
mod event_log;
mod patient;

pub use doctor::*;
pub use event_log::*;
pub use patient::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Doctor, Patient, PatientStatus};
    use chrono::Utc;
    use rusqlite::Connection;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn make_patient(conn: &Connection, token: i64, urgency: i64) -> Patient {
        let patient = Patient::new(
            token,
            format!("Patient {token}"),
            "9876543210",
            "General Checkup",
            urgency,
            Utc::now(),
        );
        insert_patient(conn, &patient).unwrap();
        patient
    }

    fn make_doctor(conn: &Connection, name: &str) -> Doctor {
        let doctor = Doctor::new(name, "General Medicine");
        insert_doctor(conn, &doctor).unwrap();
        doctor
    }

    #[test]
    fn patient_insert_and_retrieve() {
        let conn = test_db();
        let patient = make_patient(&conn, 1, 5);
        let loaded = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(loaded.token_number, 1);
        assert_eq!(loaded.name, "Patient 1");
        assert_eq!(loaded.status, PatientStatus::Waiting);
        assert!(loaded.assigned_doctor_id.is_none());
    }

    #[test]
    fn get_missing_patient_returns_none() {
        let conn = test_db();
        assert!(get_patient(&conn, &uuid::Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn patients_by_status_filters() {
        let conn = test_db();
        let a = make_patient(&conn, 1, 5);
        let _b = make_patient(&conn, 2, 7);
        set_patient_status(&conn, &a.id, PatientStatus::Completed).unwrap();

        let waiting = patients_by_status(&conn, PatientStatus::Waiting).unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].token_number, 2);
    }

    #[test]
    fn assignment_round_trip() {
        let conn = test_db();
        let patient = make_patient(&conn, 1, 5);
        let doctor = make_doctor(&conn, "Dr. Priya Sharma");

        set_patient_assignment(&conn, &patient.id, Some(&doctor.id)).unwrap();
        let loaded = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(loaded.assigned_doctor_id, Some(doctor.id));

        set_patient_assignment(&conn, &patient.id, None).unwrap();
        let loaded = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert!(loaded.assigned_doctor_id.is_none());
    }

    #[test]
    fn consultation_timestamps_round_trip() {
        let conn = test_db();
        let patient = make_patient(&conn, 1, 5);
        let start = Utc::now();

        begin_patient_consultation(&conn, &patient.id, start).unwrap();
        let loaded = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(loaded.status, PatientStatus::InConsultation);
        assert_eq!(
            loaded.consultation_start.unwrap().timestamp(),
            start.timestamp()
        );

        let end = Utc::now();
        finish_patient_consultation(&conn, &patient.id, end).unwrap();
        let loaded = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(loaded.status, PatientStatus::Completed);
        assert!(loaded.consultation_end.is_some());
    }

    #[test]
    fn max_token_since_looks_back() {
        let conn = test_db();
        make_patient(&conn, 4, 5);
        make_patient(&conn, 9, 5);
        let since = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(max_token_since(&conn, since).unwrap(), 9);

        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(max_token_since(&conn, future).unwrap(), 0);
    }

    #[test]
    fn status_counts_groups() {
        let conn = test_db();
        let a = make_patient(&conn, 1, 5);
        make_patient(&conn, 2, 5);
        set_patient_status(&conn, &a.id, PatientStatus::NoShow).unwrap();

        let counts = patient_status_counts(&conn).unwrap();
        assert_eq!(counts.get(&PatientStatus::Waiting), Some(&1));
        assert_eq!(counts.get(&PatientStatus::NoShow), Some(&1));
    }

    #[test]
    fn doctor_insert_and_retrieve() {
        let conn = test_db();
        let doctor = make_doctor(&conn, "Dr. Anil Mehta");
        let loaded = get_doctor(&conn, &doctor.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Dr. Anil Mehta");
        assert!(loaded.is_active);
        assert!(!loaded.is_on_break);
        assert_eq!(loaded.consulted_today, 0);
    }

    #[test]
    fn available_doctors_ordered_by_load_then_id() {
        let conn = test_db();
        let a = make_doctor(&conn, "Dr. A");
        let b = make_doctor(&conn, "Dr. B");
        increment_doctor_consulted(&conn, &a.id).unwrap();

        let available = available_doctors(&conn, None).unwrap();
        assert_eq!(available.len(), 2);
        assert_eq!(available[0].id, b.id, "least-loaded doctor first");
    }

    #[test]
    fn available_doctors_excludes_busy_and_excluded() {
        let conn = test_db();
        let a = make_doctor(&conn, "Dr. A");
        let b = make_doctor(&conn, "Dr. B");
        let c = make_doctor(&conn, "Dr. C");
        let patient = make_patient(&conn, 1, 5);

        set_doctor_current_patient(&conn, &a.id, Some(&patient.id)).unwrap();
        set_doctor_flags(&conn, &b.id, b.is_active, true).unwrap();

        let available = available_doctors(&conn, None).unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, c.id);

        let available = available_doctors(&conn, Some(&c.id)).unwrap();
        assert!(available.is_empty());
    }

    #[test]
    fn reset_doctor_counts_zeroes_everyone() {
        let conn = test_db();
        let a = make_doctor(&conn, "Dr. A");
        increment_doctor_consulted(&conn, &a.id).unwrap();
        increment_doctor_consulted(&conn, &a.id).unwrap();

        let reset = reset_doctor_daily_counts(&conn).unwrap();
        assert_eq!(reset, 1);
        let loaded = get_doctor(&conn, &a.id).unwrap().unwrap();
        assert_eq!(loaded.consulted_today, 0);
    }

    #[test]
    fn event_log_appends_and_lists() {
        let conn = test_db();
        let patient = make_patient(&conn, 1, 5);
        insert_event(
            &conn,
            "patient_registered",
            Some(&patient.id),
            Some(&serde_json::json!({"token": 1})),
        )
        .unwrap();
        insert_event(&conn, "queue_rebalanced", None, None).unwrap();

        let events = recent_events(&conn, 10).unwrap();
        assert_eq!(events.len(), 2);
        // Newest first
        assert_eq!(events[0].event_type, "queue_rebalanced");
        assert_eq!(events[1].reference_id, Some(patient.id));
        assert!(events[1].metadata.as_deref().unwrap().contains("token"));
    }
}
