//! [apps/control-plane/src/handlers/audit.rs]
//! `GET /api/audit`: query the audit trail filtered by user, client, event,
//! and date range.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use nyx_domain_models::audit::AuditEntry;
use nyx_domain_models::NyxError;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub user: Option<String>,
    pub client: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

pub async fn list_audit(State(state): State<AppState>, Query(query): Query<AuditQuery>) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let entries = state
        .audit_repo
        .list(query.user.as_deref(), query.client.as_deref(), query.since, query.limit.unwrap_or(100))
        .await
        .map_err(NyxError::from)?;
    Ok(Json(entries))
}
