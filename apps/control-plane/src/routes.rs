//! [apps/control-plane/src/routes.rs]
//! Router composition: a CORS layer at the root, sub-routers merged by
//! concern, guards layered narrowly (`/api/ws` skips the bearer check — it
//! authenticates via its own query-param token instead) rather than
//! blanket-applied to the whole app.

use axum::http::{header, Method};
use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{audit, auth, bookings, chat, export, monitor, upload, ws};
use crate::middleware::{access_guard, auth_guard};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    let public = Router::new().route("/api/auth/login", post(auth::login));

    let websocket = Router::new().route("/api/ws", get(ws::upgrade));

    let bearer_protected = Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/api/pending", get(bookings::list_pending))
        .route("/api/bookings", post(bookings::submit))
        .route("/api/bookings/:id/approve", post(bookings::approve))
        .route("/api/bookings/:id/reject", post(bookings::reject))
        .route("/api/bookings/:id/correct", post(bookings::correct))
        .route("/api/export", post(export::export_approved))
        .route("/api/upload", post(upload::upload))
        .route("/api/audit", get(audit::list_audit))
        .route("/api/monitor", get(monitor::monitor))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_guard));

    Router::new()
        .merge(public)
        .merge(websocket)
        .merge(bearer_protected)
        .layer(axum_middleware::from_fn_with_state(state.clone(), access_guard))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
