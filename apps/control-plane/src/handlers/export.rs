//! [apps/control-plane/src/handlers/export.rs]
//! `POST /api/export`. Calls the external ERP port and only flips
//! `exported_flag` on a genuinely successful result — partial success is
//! never acceptable.

use axum::extract::State;
use axum::{Extension, Json};
use nyx_domain_models::NyxError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::AuthedUser;
use crate::ports::erp::ErpExportRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub client_id: String,
    pub erp_name: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub status: String,
    pub filename: String,
    pub records: usize,
}

pub async fn export_approved(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(body): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, ApiError> {
    let client = state
        .client_repo
        .get(&body.client_id)
        .await
        .map_err(NyxError::from)?
        .ok_or_else(|| NyxError::NotFound(format!("client '{}'", body.client_id)))?;

    let approved = state.proposals.list_approved(&body.client_id).await?;
    if approved.is_empty() {
        return Ok(Json(ExportResponse { status: "exported".to_string(), filename: String::new(), records: 0 }));
    }

    let erp_name = body.erp_name.as_deref().unwrap_or(&client.erp_target);
    let format = body.format.as_deref().unwrap_or(&client.erp_format);

    let result = state
        .erp_port
        .emit(ErpExportRequest { bookings: &approved, client: &client, erp_name, format })
        .await?;

    if result.status != "exported" {
        return Err(NyxError::Internal(format!("ERP emitter reported status '{}': {:?}", result.status, result.errors)).into());
    }

    let ids: Vec<String> = approved.iter().map(|p| p.id.clone()).collect();
    state.proposals.mark_exported(&ids, &user.user_id, &body.client_id).await?;

    Ok(Json(ExportResponse { status: result.status, filename: result.filename, records: result.records }))
}
