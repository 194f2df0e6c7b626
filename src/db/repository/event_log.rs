use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::patient::parse_timestamp;
use crate::db::DatabaseError;
use crate::models::EventRecord;

/// Append one event to the audit trail.
pub fn insert_event(
    conn: &Connection,
    event_type: &str,
    reference_id: Option<&Uuid>,
    metadata: Option<&serde_json::Value>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO event_logs (event_type, reference_id, metadata, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            event_type,
            reference_id.map(|id| id.to_string()),
            metadata.map(|m| m.to_string()),
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Most recent events, newest first.
pub fn recent_events(conn: &Connection, limit: i64) -> Result<Vec<EventRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, event_type, reference_id, metadata, timestamp
         FROM event_logs ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (id, event_type, reference_id, metadata, timestamp) = row?;
        events.push(EventRecord {
            id,
            event_type,
            reference_id: reference_id.and_then(|s| Uuid::parse_str(&s).ok()),
            metadata,
            timestamp: parse_timestamp(&timestamp)?,
        });
    }
    Ok(events)
}
