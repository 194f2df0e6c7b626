use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PatientStatus;

/// A registered patient. Rows are never deleted; patients leave the live
/// queue through a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    /// Sequential daily token, unique per day, issued at registration.
    pub token_number: i64,
    pub name: String,
    pub phone: String,
    pub reason: String,
    /// Medical urgency estimate, 1 (routine) to 10 (emergency).
    pub urgency: i64,
    pub status: PatientStatus,
    pub assigned_doctor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub consultation_start: Option<DateTime<Utc>>,
    pub consultation_end: Option<DateTime<Utc>>,
}

impl Patient {
    /// New WAITING patient at the moment of registration.
    pub fn new(
        token_number: i64,
        name: impl Into<String>,
        phone: impl Into<String>,
        reason: impl Into<String>,
        urgency: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_number,
            name: name.into(),
            phone: phone.into(),
            reason: reason.into(),
            urgency,
            status: PatientStatus::Waiting,
            assigned_doctor_id: None,
            created_at,
            consultation_start: None,
            consultation_end: None,
        }
    }
}
