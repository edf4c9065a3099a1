//! [apps/control-plane/src/error.rs]
//! Maps `NyxError` onto the HTTP surface, wrapped in the
//! `{error: {kind, message, retry_after?}}` envelope. This is the only
//! place in the crate that turns a kind into a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nyx_domain_models::{ErrorKind, NyxError};
use serde::Serialize;
use tracing::error;

pub struct ApiError(pub NyxError);

impl From<NyxError> for ApiError {
    fn from(e: NyxError) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorEnvelope,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_s: Option<u64>,
}

/// Kind -> status mapping: 400/401/403/404/409/429/503/500, never more
/// specific than the error taxonomy calls for.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::BalanceError => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden | ErrorKind::SafetyBlocked => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::QueueFull | ErrorKind::QueueTimeout | ErrorKind::StorageBusy => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::StorageError | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("💥 [API_FAULT]: {}", self.0);
        }

        let body = ErrorBody {
            error: ErrorEnvelope { kind, message: self.0.to_string(), retry_after_s: self.0.retry_after_s() },
        };
        (status, Json(body)).into_response()
    }
}
