//! [apps/control-plane/src/handlers/ws.rs]
//! `WS /api/ws`: one socket multiplexes the chat stream and the
//! notification fabric. Three tasks — downstream, upstream, and an
//! internal chat worker — run concurrently: whichever finishes first
//! aborts the other two for deterministic cleanup, and I/O never runs
//! under a lock.

use std::collections::BTreeMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use nyx_domain_models::audit::{AuditEvent, Severity};
use nyx_domain_models::notification::Notification;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{info, instrument, warn};

use crate::services::chat_router::route_chat;
use crate::state::AppState;

const KEEPALIVE_INTERVAL_SECONDS: u64 = 25;
const COMMAND_BUFFER_CAPACITY: usize = 32;

#[derive(Debug, Deserialize)]
pub struct WsAuth {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IncomingFrame {
    ChatUser {
        text: String,
        #[serde(default)]
        priority: u8,
    },
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutgoingFrame {
    ChatChunk { text: String },
    ChatDone { module_used: String, module_data: serde_json::Value },
    Notification { notification: Notification },
    UnreadNotifications { notifications: Vec<Notification> },
    Pong,
    Error { message: String },
}

/// The WebSocket upgrade has no Authorization header on most clients, so
/// the session token travels as a query parameter instead and is checked
/// here, before the upgrade.
#[instrument(skip(upgrade, state))]
pub async fn upgrade(upgrade: WebSocketUpgrade, State(state): State<AppState>, Query(auth): Query<WsAuth>) -> impl IntoResponse {
    match state.sessions.get(&auth.token).await {
        Some(session) => {
            upgrade.on_upgrade(move |socket| handle_socket(socket, state, session.id, session.user_id)).into_response()
        }
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String, user_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (connection_id, mut notification_rx, unread) = state.notifications.connect(&user_id).await;

    info!("⚡ [WS_OPEN]: session {session_id} connected (connection {connection_id})");

    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<OutgoingFrame>();
    let _ = outgoing_tx.send(OutgoingFrame::UnreadNotifications { notifications: unread });

    let (command_tx, mut command_rx) = mpsc::channel::<String>(COMMAND_BUFFER_CAPACITY);

    let worker_state = state.clone();
    let worker_user_id = user_id.clone();
    let worker_session_id = session_id.clone();
    let worker_outgoing = outgoing_tx.clone();
    let mut worker_task = tokio::spawn(async move {
        while let Some(raw) = command_rx.recv().await {
            let frame: IncomingFrame = match serde_json::from_str(&raw) {
                Ok(frame) => frame,
                Err(e) => {
                    let _ = worker_outgoing.send(OutgoingFrame::Error { message: format!("malformed frame: {e}") });
                    continue;
                }
            };
            match frame {
                IncomingFrame::ChatUser { text, priority } => {
                    handle_chat_user(&worker_state, &worker_session_id, &worker_user_id, &text, priority, &worker_outgoing).await;
                }
                IncomingFrame::Ping => {
                    let _ = worker_outgoing.send(OutgoingFrame::Pong);
                }
            }
        }
    });

    let mut sender_task = tokio::spawn(async move {
        let mut keepalive = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECONDS));
        loop {
            tokio::select! {
                _ = keepalive.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
                Some(frame) = outgoing_rx.recv() => {
                    let payload = serde_json::to_string(&frame).unwrap_or_default();
                    if sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                notification = notification_rx.recv() => {
                    match notification {
                        Some(notification) => {
                            let payload = serde_json::to_string(&OutgoingFrame::Notification { notification }).unwrap_or_default();
                            if sender.send(Message::Text(payload)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    });

    let mut receiver_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(raw)) => {
                    if command_tx.send(raw).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    warn!("⚠️ [WS_FAULT]: session {session_id} read error: {e}");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut sender_task => { receiver_task.abort(); worker_task.abort(); }
        _ = &mut receiver_task => { sender_task.abort(); worker_task.abort(); }
        _ = &mut worker_task => { sender_task.abort(); receiver_task.abort(); }
    }

    state.notifications.disconnect(&user_id, connection_id).await;
    info!("💀 [WS_CLOSE]: connection {connection_id} released");
}

async fn handle_chat_user(
    state: &AppState,
    session_id: &str,
    user_id: &str,
    text: &str,
    priority: u8,
    outgoing: &mpsc::UnboundedSender<OutgoingFrame>,
) {
    let evaluation = state.overseer.evaluate(text, "chat");
    if !evaluation.approved {
        let mut details = BTreeMap::new();
        details.insert("boundary_type".to_string(), evaluation.boundary_type.clone().unwrap_or_default());
        let _ = state
            .audit_repo
            .log(AuditEvent::Security, user_id, None, "chat.safety_blocked", &details, Severity::Critical, None, None, None)
            .await;
        let _ = outgoing.send(OutgoingFrame::Error { message: evaluation.reason });
        return;
    }

    let permit = match state.llm_queue.submit(user_id, priority).await {
        Ok(permit) => permit,
        Err(e) => {
            let _ = outgoing.send(OutgoingFrame::Error { message: e.to_string() });
            return;
        }
    };

    let route = route_chat(text);
    match state.llm_backend.generate(text).await {
        Ok(reply) => {
            let _ = outgoing.send(OutgoingFrame::ChatChunk { text: reply.text });
            let _ = outgoing.send(OutgoingFrame::ChatDone {
                module_used: route.module,
                module_data: json!({"confidence": route.confidence}),
            });
        }
        Err(e) => {
            let _ = outgoing.send(OutgoingFrame::Error { message: e.to_string() });
        }
    }
    drop(permit);
    state.sessions.record_message(session_id).await;
}
