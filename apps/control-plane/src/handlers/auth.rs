//! [apps/control-plane/src/handlers/auth.rs]
//! `POST /api/auth/login`. Issues the session id as the bearer token every
//! other route expects — DESIGN.md records why login lives inside this
//! crate rather than behind a separate external auth module.

use axum::extract::State;
use axum::Json;
use nyx_domain_models::NyxError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub session_id: String,
    pub user_id: String,
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Result<Json<LoginResponse>, ApiError> {
    if body.user_id.trim().is_empty() {
        return Err(NyxError::InvalidInput("user_id must not be empty".to_string()).into());
    }

    let session = state
        .sessions
        .create(&body.user_id, &body.display_name)
        .await
        .ok_or_else(|| NyxError::Forbidden("maximum of 15 concurrent sessions reached, try again shortly".to_string()))?;

    Ok(Json(LoginResponse { token: session.id.clone(), session_id: session.id, user_id: session.user_id }))
}
