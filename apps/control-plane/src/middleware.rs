//! [apps/control-plane/src/middleware.rs]
//! The two guards layered over the API: network origin first, then
//! session lookup — same shape, different checks.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

/// Injected into every authenticated request's extensions by `auth_guard`.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub session_id: String,
    pub user_id: String,
}

/// `AccessControl::evaluate(remote_ip, port)`, applied to every route
/// before any handler or the auth guard runs.
pub async fn access_guard(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let decision = state.access_control.evaluate(remote.ip(), state.config.api_port);
    if !decision.is_allowed() {
        warn!("⛔ [ACCESS_DENIED]: {} refused on the API port", remote.ip());
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"kind": "forbidden", "message": "origin not allowed on this port"}})),
        )
            .into_response();
    }
    next.run(req).await
}

/// Session-backed bearer token: the control plane issues and checks its
/// own session id as that token (see DESIGN.md for why login lives here
/// rather than behind a separate auth service).
pub async fn auth_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req.headers().get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()).and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized();
    };

    match state.sessions.get(token).await {
        Some(session) => {
            req.extensions_mut().insert(AuthedUser { session_id: session.id, user_id: session.user_id });
            next.run(req).await
        }
        None => unauthorized(),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"kind": "unauthorized", "message": "missing or expired session token"}})),
    )
        .into_response()
}
