//! [libs/domain/models/src/ledger.rs]
//! Shapes for the double-entry ledger and the booking-proposal lifecycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Debit,
    Credit,
}

/// One leg of a double-entry booking. `amount` is always positive; direction
/// lives in `side`. Stored and transmitted as a string decimal, never a float.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerLine {
    pub konto: String,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub description: String,
    pub counterparty_tax_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Corrected,
    Exported,
}

/// A draft double-entry record awaiting human approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingProposal {
    pub id: String,
    pub client_id: String,
    pub doc_type: String,
    pub lines: Vec<LedgerLine>,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub description: String,
    pub doc_date: Option<DateTime<Utc>>,
    pub booking_date: Option<DateTime<Utc>>,
    pub status: ProposalStatus,
    pub confidence: f64,
    pub ai_reasoning: String,
    pub approver: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub erp_target: String,
    pub rejection_reason: Option<String>,
    pub exported_flag: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingProposal {
    pub fn sum_debits(&self) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.side == Side::Debit)
            .map(|l| l.amount)
            .sum()
    }

    pub fn sum_credits(&self) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.side == Side::Credit)
            .map(|l| l.amount)
            .sum()
    }
}

/// A committed, immutable record in the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub proposal_id: String,
    pub client_id: String,
    pub lines: Vec<LedgerLine>,
    pub description: String,
    pub doc_ref: String,
    pub date: DateTime<Utc>,
    pub fingerprint: String,
    pub chain_hash: String,
    pub reversed: bool,
    pub reverses: Option<String>,
}

/// An operator-chosen konto that disagreed with the AI suggestion; feeds the
/// nightly preference-pair export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub id: i64,
    pub booking_id: String,
    pub user_id: String,
    pub client_id: String,
    pub original_konto: String,
    pub corrected_konto: String,
    pub doc_type: String,
    pub supplier: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
