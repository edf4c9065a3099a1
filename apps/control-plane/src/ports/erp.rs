//! [apps/control-plane/src/ports/erp.rs]
//! The ERP-format emitter lives outside this crate:
//! `erp_emit(bookings, client, erp_name, format) -> {status, file_path,
//! filename, records, errors[]}`. `ErpPort` is the seam `ProposalPipeline`'s
//! export path calls through; `FileErpPort` is a local stand-in adapter so
//! the control plane runs end-to-end without that external module attached.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use chrono::Utc;
use nyx_domain_models::ledger::BookingProposal;
use nyx_domain_models::{Client, NyxError};
use serde::Serialize;
use tokio::fs;
use tracing::instrument;

#[derive(Debug, Clone, Serialize)]
pub struct ErpExportResult {
    pub status: String,
    pub file_path: String,
    pub filename: String,
    pub records: usize,
    pub errors: Vec<String>,
}

pub struct ErpExportRequest<'a> {
    pub bookings: &'a [BookingProposal],
    pub client: &'a Client,
    pub erp_name: &'a str,
    pub format: &'a str,
}

pub trait ErpPort: Send + Sync {
    fn emit<'a>(
        &'a self,
        request: ErpExportRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ErpExportResult, NyxError>> + Send + 'a>>;
}

/// Writes one file per export under `out_dir`. The core is agnostic to ERP
/// file syntax; this is not the real CPP/Synesis emitter, which is out of
/// scope here.
pub struct FileErpPort {
    out_dir: PathBuf,
}

impl FileErpPort {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into() }
    }
}

impl ErpPort for FileErpPort {
    #[instrument(skip(self, request), fields(client = %request.client.id, erp = %request.erp_name))]
    fn emit<'a>(
        &'a self,
        request: ErpExportRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ErpExportResult, NyxError>> + Send + 'a>> {
        Box::pin(async move {
            fs::create_dir_all(&self.out_dir).await.map_err(|e| NyxError::Internal(e.to_string()))?;

            let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
            let filename = format!("{}_{}_{}.{}", request.client.id, request.erp_name, stamp, request.format);
            let path = self.out_dir.join(&filename);

            let mut body = String::new();
            for booking in request.bookings {
                body.push_str(&serde_json::to_string(booking).map_err(|e| NyxError::Internal(e.to_string()))?);
                body.push('\n');
            }
            fs::write(&path, body).await.map_err(|e| NyxError::Internal(e.to_string()))?;

            Ok(ErpExportResult {
                status: "exported".to_string(),
                file_path: path.display().to_string(),
                filename,
                records: request.bookings.len(),
                errors: Vec::new(),
            })
        })
    }
}
