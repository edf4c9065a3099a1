//! [libs/domain/models/src/document.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deterministic classification produced by the document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BankStatement,
    Invoice,
    EInvoice,
    TravelClaim,
    Reconciliation,
    PayrollRun,
    PettyCash,
    Compensation,
    Unknown,
}

impl DocumentType {
    /// Name of the external module this document type routes to.
    pub fn routed_module(&self) -> &'static str {
        match self {
            DocumentType::BankStatement => "bank_parser",
            DocumentType::Invoice => "invoice_ocr",
            DocumentType::EInvoice => "e_racun",
            DocumentType::TravelClaim => "putni_nalozi",
            DocumentType::Reconciliation => "ios",
            DocumentType::PayrollRun => "joppd",
            DocumentType::PettyCash => "blagajna",
            DocumentType::Compensation => "kompenzacije",
            DocumentType::Unknown => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Queued,
    Routed,
    Completed,
    Error,
}

/// Classification + client-matching confidences are kept distinct: the
/// `needs_review` flag reacts to either crossing its own threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub filename: String,
    pub size_bytes: u64,
    pub doc_type: DocumentType,
    pub type_confidence: f64,
    pub detected_client_id: Option<String>,
    pub client_confidence: f64,
    pub needs_review: bool,
    pub assigned_module: String,
    pub status: DocumentStatus,
    pub timestamp: DateTime<Utc>,
}

impl Document {
    pub const CLIENT_REVIEW_THRESHOLD: f64 = 0.80;
    pub const TYPE_REVIEW_THRESHOLD: f64 = 0.60;

    pub fn flag_review(&mut self) {
        self.needs_review = self.client_confidence < Self::CLIENT_REVIEW_THRESHOLD
            || self.type_confidence < Self::TYPE_REVIEW_THRESHOLD;
    }
}
