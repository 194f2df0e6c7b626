//! Queue event fan-out.
//!
//! Server → observer messages, broadcast to every connected WebSocket
//! client. Delivery is best-effort: a publish with no subscribers (or a
//! lagging subscriber) is not an error. The durable audit trail is the
//! `event_logs` table, written transactionally by the orchestrator.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::PatientStatus;
use crate::orchestrator::{QueueEntry, QueueStats};

/// Default broadcast buffer. Slow observers miss old frames rather than
/// stalling the queue.
const CHANNEL_CAPACITY: usize = 64;

/// Server → observer event messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    /// Full queue snapshot + live stats. Sent after every state change
    /// and on each recalculation tick.
    QueueUpdated {
        queue: Vec<QueueEntry>,
        stats: QueueStats,
    },
    /// One patient changed status.
    PatientStatusChanged {
        patient_id: Uuid,
        token_number: i64,
        status: PatientStatus,
        doctor_name: Option<String>,
    },
    /// A doctor's availability or chair changed.
    DoctorStatusChanged {
        doctor_id: Uuid,
        doctor_name: String,
        is_active: bool,
        is_on_break: bool,
        current_patient_id: Option<Uuid>,
    },
    /// A patient was flagged or added as an emergency.
    EmergencyAdded {
        patient_id: Uuid,
        token_number: i64,
        name: String,
        urgency: i64,
    },
    /// Server heartbeat (observers may respond or ignore).
    Heartbeat { server_time: String },
}

/// Cloneable handle to the broadcast channel.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<QueueEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers. Fire-and-forget:
    /// an empty audience is normal.
    pub fn publish(&self, event: QueueEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!("No observers for queue event: {e}");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let notifier = Notifier::new();
        notifier.publish(QueueEvent::Heartbeat {
            server_time: "2026-01-01T00:00:00Z".into(),
        });
        assert_eq!(notifier.observer_count(), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.publish(QueueEvent::EmergencyAdded {
            patient_id: Uuid::new_v4(),
            token_number: 7,
            name: "Arjun Nair".into(),
            urgency: 10,
        });

        let event = rx.recv().await.unwrap();
        match event {
            QueueEvent::EmergencyAdded { token_number, urgency, .. } => {
                assert_eq!(token_number, 7);
                assert_eq!(urgency, 10);
            }
            other => panic!("expected EmergencyAdded, got {other:?}"),
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(QueueEvent::Heartbeat {
            server_time: "t".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "Heartbeat");

        let json = serde_json::to_value(QueueEvent::PatientStatusChanged {
            patient_id: Uuid::new_v4(),
            token_number: 3,
            status: PatientStatus::InConsultation,
            doctor_name: Some("Dr. Priya Sharma".into()),
        })
        .unwrap();
        assert_eq!(json["type"], "PatientStatusChanged");
        assert_eq!(json["status"], "in_consultation");
    }
}
