use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Patient, PatientStatus};

const PATIENT_COLUMNS: &str = "id, token_number, name, phone, reason, urgency, status, \
     assigned_doctor_id, created_at, consultation_start, consultation_end";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, token_number, name, phone, reason, urgency, status,
         assigned_doctor_id, created_at, consultation_start, consultation_end)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            patient.id.to_string(),
            patient.token_number,
            patient.name,
            patient.phone,
            patient.reason,
            patient.urgency,
            patient.status.as_str(),
            patient.assigned_doctor_id.map(|id| id.to_string()),
            patient.created_at.to_rfc3339(),
            patient.consultation_start.map(|t| t.to_rfc3339()),
            patient.consultation_end.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"
    ))?;
    let mut rows = stmt.query_map(params![id.to_string()], patient_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row_to_patient(row?)?)),
        None => Ok(None),
    }
}

pub fn patients_by_status(
    conn: &Connection,
    status: PatientStatus,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE status = ?1 ORDER BY token_number"
    ))?;
    let rows = stmt.query_map(params![status.as_str()], patient_row)?;
    patient_rows_to_vec(rows)
}

/// WAITING patients currently assigned to the given doctor.
pub fn waiting_patients_assigned_to(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients
         WHERE status = 'waiting' AND assigned_doctor_id = ?1 ORDER BY token_number"
    ))?;
    let rows = stmt.query_map(params![doctor_id.to_string()], patient_row)?;
    patient_rows_to_vec(rows)
}

pub fn set_patient_status(
    conn: &Connection,
    id: &Uuid,
    status: PatientStatus,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE patients SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    Ok(())
}

pub fn set_patient_assignment(
    conn: &Connection,
    id: &Uuid,
    doctor_id: Option<&Uuid>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE patients SET assigned_doctor_id = ?2 WHERE id = ?1",
        params![id.to_string(), doctor_id.map(|d| d.to_string())],
    )?;
    Ok(())
}

pub fn set_patient_urgency(conn: &Connection, id: &Uuid, urgency: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE patients SET urgency = ?2 WHERE id = ?1",
        params![id.to_string(), urgency],
    )?;
    Ok(())
}

/// Status → IN_CONSULTATION and stamp the start time.
pub fn begin_patient_consultation(
    conn: &Connection,
    id: &Uuid,
    start: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE patients SET status = 'in_consultation', consultation_start = ?2 WHERE id = ?1",
        params![id.to_string(), start.to_rfc3339()],
    )?;
    Ok(())
}

/// Status → COMPLETED and stamp the end time.
pub fn finish_patient_consultation(
    conn: &Connection,
    id: &Uuid,
    end: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE patients SET status = 'completed', consultation_end = ?2 WHERE id = ?1",
        params![id.to_string(), end.to_rfc3339()],
    )?;
    Ok(())
}

/// Highest token issued at or after `since` (0 when none). Used to seed
/// the token counter after a restart mid-day.
pub fn max_token_since(conn: &Connection, since: DateTime<Utc>) -> Result<i64, DatabaseError> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(token_number) FROM patients WHERE created_at >= ?1",
        params![since.to_rfc3339()],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}

pub fn patient_status_counts(
    conn: &Connection,
) -> Result<HashMap<PatientStatus, i64>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM patients GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = HashMap::new();
    for row in rows {
        let (status, count) = row?;
        counts.insert(PatientStatus::from_str(&status)?, count);
    }
    Ok(counts)
}

type PatientRow = (
    String,
    i64,
    String,
    String,
    String,
    i64,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
);

fn patient_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn row_to_patient(row: PatientRow) -> Result<Patient, DatabaseError> {
    let (
        id,
        token_number,
        name,
        phone,
        reason,
        urgency,
        status,
        assigned_doctor_id,
        created_at,
        consultation_start,
        consultation_end,
    ) = row;
    Ok(Patient {
        id: parse_uuid(&id)?,
        token_number,
        name,
        phone,
        reason,
        urgency,
        status: PatientStatus::from_str(&status)?,
        assigned_doctor_id: assigned_doctor_id.and_then(|s| Uuid::parse_str(&s).ok()),
        created_at: parse_timestamp(&created_at)?,
        consultation_start: consultation_start.as_deref().map(parse_timestamp).transpose()?,
        consultation_end: consultation_end.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn patient_rows_to_vec(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<PatientRow>>,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut patients = Vec::new();
    for row in rows {
        patients.push(row_to_patient(row?)?);
    }
    Ok(patients)
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
