//! [apps/control-plane/src/handlers/chat.rs]
//! `POST /api/chat`: the non-streaming counterpart of the WebSocket chat
//! frames in `handlers::ws` — same gate, same queue, no multiplexing.
//! Useful for callers that don't hold a socket open.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::{Extension, Json};
use nyx_domain_models::audit::{AuditEvent, Severity};
use nyx_domain_models::NyxError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::AuthedUser;
use crate::services::chat_router::route_chat;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub priority: u8,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub module_used: String,
    pub module_confidence: f64,
}

pub async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let evaluation = state.overseer.evaluate(&body.message, "chat");
    if !evaluation.approved {
        let mut details = BTreeMap::new();
        details.insert("boundary_type".to_string(), evaluation.boundary_type.clone().unwrap_or_default());
        state
            .audit_repo
            .log(AuditEvent::Security, &user.user_id, None, "chat.safety_blocked", &details, Severity::Critical, None, None, None)
            .await
            .map_err(NyxError::from)?;

        return Err(NyxError::SafetyBlocked {
            boundary_type: evaluation.boundary_type.unwrap_or_default(),
            reason: evaluation.reason,
        }
        .into());
    }

    let permit = state.llm_queue.submit(&user.user_id, body.priority).await?;
    let route = route_chat(&body.message);
    let reply = state.llm_backend.generate(&body.message).await?;
    drop(permit);

    state.sessions.record_message(&user.session_id).await;

    Ok(Json(ChatResponse { reply: reply.text, module_used: route.module, module_confidence: route.confidence }))
}
