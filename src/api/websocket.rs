//! WebSocket layer for live queue observation.
//!
//! Observers (reception dashboards, doctor consoles) connect to
//! `GET /ws` and receive every [`QueueEvent`] as a JSON text frame.
//! Connections are read-only: incoming text is ignored, a close frame
//! ends the session. A heartbeat goes out every 30 seconds so idle
//! connections stay warm through proxies. Observers that lag behind the
//! broadcast buffer skip missed frames and continue — the next
//! `QueueUpdated` carries the full state anyway.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::api::types::ApiContext;
use crate::notify::{Notifier, QueueEvent};

/// Heartbeat interval for idle connections.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket upgrade handler for `GET /ws`.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<ApiContext>,
) -> impl IntoResponse {
    let notifier = ctx.notifier.clone();
    ws.on_upgrade(move |socket| handle_ws(socket, notifier))
}

async fn handle_ws(socket: WebSocket, notifier: Notifier) {
    let (mut sink, mut stream) = socket.split();
    let mut events = notifier.subscribe();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // Consume initial immediate tick

    tracing::info!("Queue observer connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(json) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if sink.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "Observer lagged, skipping to fresh events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            _ = heartbeat.tick() => {
                let beat = QueueEvent::Heartbeat {
                    server_time: chrono::Utc::now().to_rfc3339(),
                };
                let Ok(json) = serde_json::to_string(&beat) else {
                    continue;
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // Observers are read-only; Ping/Pong is handled by axum.
                    _ => {}
                }
            }
        }
    }

    tracing::info!("Queue observer disconnected");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures_util::StreamExt;
    use tokio_tungstenite::tungstenite;

    use crate::api::router::api_router;
    use crate::api::types::ApiContext;
    use crate::db::sqlite::open_memory_database;
    use crate::notify::Notifier;
    use crate::orchestrator::{QueueOrchestrator, RegisterPatient};
    use crate::triage::UrgencyClassifier;

    async fn setup_ws_server() -> (String, ApiContext, tokio::task::JoinHandle<()>) {
        let conn = open_memory_database().unwrap();
        let orchestrator =
            Arc::new(QueueOrchestrator::new(conn, Notifier::new(), 12).unwrap());
        let ctx = ApiContext::new(orchestrator, Arc::new(UrgencyClassifier::disabled()));
        let app = api_router(ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("ws://127.0.0.1:{}/ws", addr.port()), ctx, handle)
    }

    #[tokio::test]
    async fn observer_receives_queue_update_on_registration() {
        let (url, ctx, server) = setup_ws_server().await;

        let (mut ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("WS connect failed");

        // Give the server a moment to register the subscription.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        ctx.orchestrator
            .register(RegisterPatient {
                name: "Kiran Kumar".into(),
                phone: "9876543214".into(),
                reason: "General Checkup".into(),
                urgency: 4,
            })
            .unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for QueueUpdated")
            .expect("stream ended")
            .expect("WS error");

        let text = msg.into_text().expect("not text");
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], "QueueUpdated");
        assert_eq!(parsed["queue"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["stats"]["in_queue"], 1);

        let _ = futures_util::SinkExt::close(&mut ws).await;
        server.abort();
    }

    #[tokio::test]
    async fn close_frame_ends_session_cleanly() {
        let (url, ctx, server) = setup_ws_server().await;

        let (mut ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("WS connect failed");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(ctx.notifier.observer_count(), 1);

        futures_util::SinkExt::send(&mut ws, tungstenite::Message::Close(None))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(ctx.notifier.observer_count(), 0);

        server.abort();
    }

    #[tokio::test]
    async fn observer_text_frames_are_ignored() {
        let (url, ctx, server) = setup_ws_server().await;

        let (mut ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("WS connect failed");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        futures_util::SinkExt::send(
            &mut ws,
            tungstenite::Message::Text("not a command".into()),
        )
        .await
        .unwrap();

        // Connection must survive and still deliver events.
        ctx.notifier.publish(crate::notify::QueueEvent::Heartbeat {
            server_time: chrono::Utc::now().to_rfc3339(),
        });

        let msg = tokio::time::timeout(std::time::Duration::from_secs(5), ws.next())
            .await
            .expect("timeout — connection should still be alive")
            .expect("stream ended")
            .expect("WS error");
        let parsed: serde_json::Value =
            serde_json::from_str(&msg.into_text().unwrap()).unwrap();
        assert_eq!(parsed["type"], "Heartbeat");

        let _ = futures_util::SinkExt::close(&mut ws).await;
        server.abort();
    }
}
