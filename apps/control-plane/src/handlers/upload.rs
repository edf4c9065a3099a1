//! [apps/control-plane/src/handlers/upload.rs]
//! `POST /api/upload`. Classification and client-matching only — the core
//! never performs PDF/OCR text extraction itself; callers supply
//! already-extracted text alongside the file metadata.

use axum::extract::State;
use axum::Json;
use nyx_domain_models::document::Document;
use nyx_domain_models::NyxError;
use serde::Deserialize;

use crate::error::ApiError;
use crate::services::document_pipeline::{ingest, IngestRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    pub source: String,
    pub text: Option<String>,
    pub size_bytes: u64,
    pub source_folder: Option<String>,
    pub sender_domain: Option<String>,
}

pub async fn upload(State(state): State<AppState>, Json(body): Json<UploadRequest>) -> Result<Json<Document>, ApiError> {
    if body.filename.trim().is_empty() {
        return Err(NyxError::InvalidInput("filename must not be empty".to_string()).into());
    }

    let clients = state.client_repo.list_active().await.map_err(NyxError::from)?;
    let document = ingest(
        IngestRequest {
            filename: &body.filename,
            source: &body.source,
            text: body.text.as_deref(),
            size_bytes: body.size_bytes,
            source_folder: body.source_folder.as_deref(),
            sender_domain: body.sender_domain.as_deref(),
        },
        &clients,
    );

    Ok(Json(document))
}
