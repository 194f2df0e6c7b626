use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One row of the append-only audit trail. Written on every
/// state-changing operation, never consumed by queue logic.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: i64,
    pub event_type: String,
    pub reference_id: Option<Uuid>,
    /// Structured context, stored as a JSON string.
    pub metadata: Option<String>,
    pub timestamp: DateTime<Utc>,
}
