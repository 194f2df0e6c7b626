use rusqlite::{params, Connection};
use uuid::Uuid;

use super::patient::parse_uuid;
use crate::db::DatabaseError;
use crate::models::Doctor;

const DOCTOR_COLUMNS: &str =
    "id, name, specialization, is_active, is_on_break, current_patient_id, consulted_today";

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, name, specialization, is_active, is_on_break,
         current_patient_id, consulted_today)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            doctor.id.to_string(),
            doctor.name,
            doctor.specialization,
            doctor.is_active as i32,
            doctor.is_on_break as i32,
            doctor.current_patient_id.map(|id| id.to_string()),
            doctor.consulted_today,
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ?1"
    ))?;
    let mut rows = stmt.query_map(params![id.to_string()], doctor_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row_to_doctor(row?)?)),
        None => Ok(None),
    }
}

pub fn list_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {DOCTOR_COLUMNS} FROM doctors ORDER BY id"))?;
    let rows = stmt.query_map([], doctor_row)?;
    doctor_rows_to_vec(rows)
}

/// Available doctors (active, not on break, chair empty), least-consulted
/// first, ties broken by id for determinism. `exclude` removes one doctor
/// from consideration (used when reassigning away from them).
pub fn available_doctors(
    conn: &Connection,
    exclude: Option<&Uuid>,
) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors
         WHERE is_active = 1 AND is_on_break = 0 AND current_patient_id IS NULL
           AND (?1 IS NULL OR id != ?1)
         ORDER BY consulted_today ASC, id ASC"
    ))?;
    let rows = stmt.query_map(params![exclude.map(|id| id.to_string())], doctor_row)?;
    doctor_rows_to_vec(rows)
}

pub fn set_doctor_flags(
    conn: &Connection,
    id: &Uuid,
    is_active: bool,
    is_on_break: bool,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE doctors SET is_active = ?2, is_on_break = ?3 WHERE id = ?1",
        params![id.to_string(), is_active as i32, is_on_break as i32],
    )?;
    Ok(())
}

pub fn set_doctor_current_patient(
    conn: &Connection,
    id: &Uuid,
    patient_id: Option<&Uuid>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE doctors SET current_patient_id = ?2 WHERE id = ?1",
        params![id.to_string(), patient_id.map(|p| p.to_string())],
    )?;
    Ok(())
}

pub fn increment_doctor_consulted(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE doctors SET consulted_today = consulted_today + 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(())
}

/// Zero every doctor's daily counter. Returns the number of rows touched.
pub fn reset_doctor_daily_counts(conn: &Connection) -> Result<usize, DatabaseError> {
    let changed = conn.execute("UPDATE doctors SET consulted_today = 0", [])?;
    Ok(changed)
}

pub fn count_doctors(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM doctors", [], |row| row.get(0))?;
    Ok(count)
}

type DoctorRow = (String, String, String, i32, i32, Option<String>, i64);

fn doctor_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DoctorRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn row_to_doctor(row: DoctorRow) -> Result<Doctor, DatabaseError> {
    let (id, name, specialization, is_active, is_on_break, current_patient_id, consulted_today) =
        row;
    Ok(Doctor {
        id: parse_uuid(&id)?,
        name,
        specialization,
        is_active: is_active != 0,
        is_on_break: is_on_break != 0,
        current_patient_id: current_patient_id.and_then(|s| Uuid::parse_str(&s).ok()),
        consulted_today,
    })
}

fn doctor_rows_to_vec(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<DoctorRow>>,
) -> Result<Vec<Doctor>, DatabaseError> {
    let mut doctors = Vec::new();
    for row in rows {
        doctors.push(row_to_doctor(row?)?);
    }
    Ok(doctors)
}
