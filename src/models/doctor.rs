use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A clinic doctor. Created administratively; daily counters reset at
/// the configured reset hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub is_active: bool,
    pub is_on_break: bool,
    /// At most one patient in consultation at a time.
    pub current_patient_id: Option<Uuid>,
    pub consulted_today: i64,
}

impl Doctor {
    pub fn new(name: impl Into<String>, specialization: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            specialization: specialization.into(),
            is_active: true,
            is_on_break: false,
            current_patient_id: None,
            consulted_today: 0,
        }
    }

    /// Available = active, not on break, and no patient in the chair.
    pub fn is_available(&self) -> bool {
        self.is_active && !self.is_on_break && self.current_patient_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_doctor_is_available() {
        let d = Doctor::new("Dr. Priya Sharma", "General Medicine");
        assert!(d.is_available());
    }

    #[test]
    fn availability_requires_all_three_conditions() {
        let mut d = Doctor::new("Dr. Anil Mehta", "Cardiology");
        d.is_on_break = true;
        assert!(!d.is_available());

        d.is_on_break = false;
        d.is_active = false;
        assert!(!d.is_available());

        d.is_active = true;
        d.current_patient_id = Some(Uuid::new_v4());
        assert!(!d.is_available());
    }
}
