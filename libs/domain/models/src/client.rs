//! [libs/domain/models/src/client.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the tenant namespace for every booking, document, and audit row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub legal_name: String,
    pub tax_id: String,
    pub ibans: Vec<String>,
    pub erp_target: String,
    pub erp_format: String,
    pub vat_period: String,
    pub size_category: String,
    pub aliases: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(id: impl Into<String>, legal_name: impl Into<String>, tax_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            legal_name: legal_name.into(),
            tax_id: tax_id.into(),
            ibans: Vec::new(),
            erp_target: "CPP".to_string(),
            erp_format: "csv".to_string(),
            vat_period: "monthly".to_string(),
            size_category: "small".to_string(),
            aliases: Vec::new(),
            active: true,
            created_at: Utc::now(),
        }
    }
}
