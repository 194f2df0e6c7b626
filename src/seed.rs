//! Seed a demo doctor roster on first start.

use rusqlite::Connection;

use crate::db::repository::{count_doctors, insert_doctor};
use crate::db::DatabaseError;
use crate::models::Doctor;

const SEED_DOCTORS: &[(&str, &str)] = &[
    ("Dr. Priya Sharma", "General Medicine"),
    ("Dr. Anil Mehta", "Cardiology"),
    ("Dr. Sneha Rao", "Pediatrics"),
];

/// Insert the demo roster when the doctors table is empty. Returns the
/// number of doctors created (0 when data already exists).
pub fn seed_if_empty(conn: &Connection) -> Result<usize, DatabaseError> {
    if count_doctors(conn)? > 0 {
        tracing::debug!("Doctors already present, skipping seed");
        return Ok(0);
    }

    for (name, specialization) in SEED_DOCTORS {
        insert_doctor(conn, &Doctor::new(*name, *specialization))?;
    }
    tracing::info!(count = SEED_DOCTORS.len(), "Seeded demo doctors");
    Ok(SEED_DOCTORS.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn seeds_empty_database_once() {
        let conn = open_memory_database().unwrap();
        assert_eq!(seed_if_empty(&conn).unwrap(), 3);
        assert_eq!(count_doctors(&conn).unwrap(), 3);

        // Second call is a no-op.
        assert_eq!(seed_if_empty(&conn).unwrap(), 0);
        assert_eq!(count_doctors(&conn).unwrap(), 3);
    }
}
