//! [libs/domain/models/src/audit.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Auth,
    Booking,
    Approval,
    Correction,
    Export,
    Security,
}

/// Append-only row. Every mutation produces exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub event: AuditEvent,
    pub user_id: String,
    pub client_id: Option<String>,
    pub action: String,
    pub details: BTreeMap<String, String>,
    pub severity: Severity,
    pub booking_id: Option<String>,
    pub fingerprint: Option<String>,
    pub chain_hash: Option<String>,
}
