//! [libs/infra/store/src/repositories/booking.rs]
//! Durable CRUD for booking proposals. Mutations write through
//! in the same call that updates the in-memory pipeline cache one layer up.

use chrono::{DateTime, Utc};
use libsql::params;
use nyx_domain_models::ledger::{BookingProposal, LedgerLine, ProposalStatus};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{error, instrument};

use crate::errors::StoreError;
use crate::pool::StorePool;

#[derive(Clone)]
pub struct BookingRepository {
    pool: StorePool,
}

fn status_str(status: ProposalStatus) -> &'static str {
    match status {
        ProposalStatus::Pending => "pending",
        ProposalStatus::Approved => "approved",
        ProposalStatus::Rejected => "rejected",
        ProposalStatus::Corrected => "corrected",
        ProposalStatus::Exported => "exported",
    }
}

fn status_from_str(s: &str) -> ProposalStatus {
    match s {
        "approved" => ProposalStatus::Approved,
        "rejected" => ProposalStatus::Rejected,
        "corrected" => ProposalStatus::Corrected,
        "exported" => ProposalStatus::Exported,
        _ => ProposalStatus::Pending,
    }
}

fn row_to_proposal(row: &libsql::Row) -> Result<BookingProposal, StoreError> {
    let lines_json: String = row.get(5).map_err(|e| StoreError::Mapping(e.to_string()))?;
    let lines: Vec<LedgerLine> =
        serde_json::from_str(&lines_json).map_err(|e| StoreError::Mapping(e.to_string()))?;

    let parse_decimal = |s: String| Decimal::from_str(&s).unwrap_or(Decimal::ZERO);

    Ok(BookingProposal {
        id: row.get(0).map_err(|e| StoreError::Mapping(e.to_string()))?,
        client_id: row.get(1).map_err(|e| StoreError::Mapping(e.to_string()))?,
        doc_type: row.get(2).map_err(|e| StoreError::Mapping(e.to_string()))?,
        lines,
        vat_rate: parse_decimal(row.get::<String>(6).map_err(|e| StoreError::Mapping(e.to_string()))?),
        vat_amount: parse_decimal(row.get::<String>(7).map_err(|e| StoreError::Mapping(e.to_string()))?),
        description: row.get::<Option<String>>(8).map_err(|e| StoreError::Mapping(e.to_string()))?.unwrap_or_default(),
        doc_date: row
            .get::<Option<String>>(10)
            .map_err(|e| StoreError::Mapping(e.to_string()))?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
        booking_date: row
            .get::<Option<String>>(11)
            .map_err(|e| StoreError::Mapping(e.to_string()))?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
        status: status_from_str(&row.get::<String>(12).map_err(|e| StoreError::Mapping(e.to_string()))?),
        confidence: row.get(13).map_err(|e| StoreError::Mapping(e.to_string()))?,
        ai_reasoning: row.get::<Option<String>>(14).map_err(|e| StoreError::Mapping(e.to_string()))?.unwrap_or_default(),
        approver: row.get(15).map_err(|e| StoreError::Mapping(e.to_string()))?,
        approved_at: row
            .get::<Option<String>>(16)
            .map_err(|e| StoreError::Mapping(e.to_string()))?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
        erp_target: row.get(17).map_err(|e| StoreError::Mapping(e.to_string()))?,
        rejection_reason: row.get(18).map_err(|e| StoreError::Mapping(e.to_string()))?,
        exported_flag: row.get::<i64>(19).map_err(|e| StoreError::Mapping(e.to_string()))? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<String>(20).map_err(|e| StoreError::Mapping(e.to_string()))?)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&row.get::<String>(21).map_err(|e| StoreError::Mapping(e.to_string()))?)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

const SELECT_COLUMNS: &str = "id, client_id, doc_type, konto_debit, konto_credit, lines_json, \
     vat_rate, vat_amount, description, counterparty_tax_id, doc_date, booking_date, status, \
     confidence, ai_reasoning, approver, approved_at, erp_target, rejection_reason, exported_flag, \
     created_at, updated_at";

impl BookingRepository {
    pub fn new(pool: StorePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, proposal))]
    pub async fn save(&self, proposal: &BookingProposal) -> Result<(), StoreError> {
        let conn = self.pool.acquire().await?;
        let lines_json = serde_json::to_string(&proposal.lines).map_err(|e| StoreError::Mapping(e.to_string()))?;
        let konto_debit = proposal.lines.iter().find(|l| matches!(l.side, nyx_domain_models::ledger::Side::Debit)).map(|l| l.konto.clone());
        let konto_credit = proposal.lines.iter().find(|l| matches!(l.side, nyx_domain_models::ledger::Side::Credit)).map(|l| l.konto.clone());

        conn.execute(
            "INSERT INTO bookings
                (id, client_id, doc_type, konto_debit, konto_credit, lines_json, amount,
                 vat_rate, vat_amount, description, counterparty_tax_id, doc_date, booking_date,
                 status, confidence, ai_reasoning, approver, approved_at, erp_target,
                 rejection_reason, exported_flag, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
             ON CONFLICT(id) DO UPDATE SET
                lines_json=excluded.lines_json, amount=excluded.amount, vat_rate=excluded.vat_rate,
                vat_amount=excluded.vat_amount, description=excluded.description, status=excluded.status,
                confidence=excluded.confidence, ai_reasoning=excluded.ai_reasoning, approver=excluded.approver,
                approved_at=excluded.approved_at, erp_target=excluded.erp_target,
                rejection_reason=excluded.rejection_reason, exported_flag=excluded.exported_flag,
                updated_at=excluded.updated_at",
            params![
                proposal.id.clone(),
                proposal.client_id.clone(),
                proposal.doc_type.clone(),
                konto_debit,
                konto_credit,
                lines_json,
                proposal.sum_debits().to_string(),
                proposal.vat_rate.to_string(),
                proposal.vat_amount.to_string(),
                proposal.description.clone(),
                None::<String>,
                proposal.doc_date.map(|d| d.to_rfc3339()),
                proposal.booking_date.map(|d| d.to_rfc3339()),
                status_str(proposal.status).to_string(),
                proposal.confidence,
                proposal.ai_reasoning.clone(),
                proposal.approver.clone(),
                proposal.approved_at.map(|d| d.to_rfc3339()),
                proposal.erp_target.clone(),
                proposal.rejection_reason.clone(),
                proposal.exported_flag as i64,
                proposal.created_at.to_rfc3339(),
                proposal.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| {
            error!("⚠️ [STORE]: save_booking failed: {e}");
            StoreError::Query(e)
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<BookingProposal>, StoreError> {
        let conn = self.pool.acquire().await?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM bookings WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_proposal(&row)?)),
            None => Ok(None),
        }
    }

    /// `approve_booking`: only a `pending` row transitions; a zero-row update
    /// means the proposal was already decided, not a fatal error.
    #[instrument(skip(self))]
    pub async fn approve(&self, id: &str, user: &str) -> Result<bool, StoreError> {
        let conn = self.pool.acquire().await?;
        let now = Utc::now().to_rfc3339();
        let changed = conn
            .execute(
                "UPDATE bookings SET status='approved', approver=?1, approved_at=?2, updated_at=?2
                 WHERE id=?3 AND status='pending'",
                params![user.to_string(), now, id.to_string()],
            )
            .await?;
        Ok(changed > 0)
    }

    #[instrument(skip(self))]
    pub async fn reject(&self, id: &str, reason: &str) -> Result<bool, StoreError> {
        let conn = self.pool.acquire().await?;
        let now = Utc::now().to_rfc3339();
        let changed = conn
            .execute(
                "UPDATE bookings SET status='rejected', rejection_reason=?1, updated_at=?2
                 WHERE id=?3 AND status='pending'",
                params![reason.to_string(), now, id.to_string()],
            )
            .await?;
        Ok(changed > 0)
    }

    /// `correct`: rewrites the pending proposal's lines; stays `pending`
    /// (renamed to `corrected` only transiently for audit clarity) until the
    /// operator explicitly approves.
    #[instrument(skip(self, new_lines))]
    pub async fn apply_correction(&self, id: &str, new_lines: &[LedgerLine]) -> Result<bool, StoreError> {
        let conn = self.pool.acquire().await?;
        let lines_json = serde_json::to_string(new_lines).map_err(|e| StoreError::Mapping(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        let changed = conn
            .execute(
                "UPDATE bookings SET lines_json=?1, updated_at=?2 WHERE id=?3 AND status='pending'",
                params![lines_json, now, id.to_string()],
            )
            .await?;
        Ok(changed > 0)
    }

    #[instrument(skip(self))]
    pub async fn list_pending(&self, client_id: Option<&str>) -> Result<Vec<BookingProposal>, StoreError> {
        let conn = self.pool.acquire().await?;
        let mut out = Vec::new();
        let mut rows = if let Some(client) = client_id {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM bookings WHERE status='pending' AND client_id=?1 ORDER BY created_at ASC"
            );
            conn.query(&sql, params![client.to_string()]).await?
        } else {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM bookings WHERE status='pending' ORDER BY created_at ASC");
            conn.query(&sql, ()).await?
        };
        while let Some(row) = rows.next().await? {
            out.push(row_to_proposal(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn list_approved_unexported(&self, client_id: &str) -> Result<Vec<BookingProposal>, StoreError> {
        let conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM bookings WHERE status='approved' AND exported_flag=0 AND client_id=?1 ORDER BY booking_date ASC"
        );
        let mut rows = conn.query(&sql, params![client_id.to_string()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_proposal(&row)?);
        }
        Ok(out)
    }

    /// `mark_exported`: flips `exported_flag` for the given ids in one write.
    /// Partial success is not permitted by the caller's contract — this
    /// statement either updates every row or the caller never invokes it.
    #[instrument(skip(self, ids))]
    pub async fn mark_exported(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.pool.acquire().await?;
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "UPDATE bookings SET status='exported', exported_flag=1, updated_at=datetime('now') WHERE id IN ({})",
            placeholders.join(",")
        );
        let params: Vec<libsql::Value> = ids.iter().map(|id| libsql::Value::Text(id.clone())).collect();
        conn.execute(&sql, params).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoreClient;
    use nyx_domain_models::ledger::Side;

    fn sample_proposal(id: &str) -> BookingProposal {
        let now = Utc::now();
        BookingProposal {
            id: id.to_string(),
            client_id: "K001".to_string(),
            doc_type: "invoice".to_string(),
            lines: vec![
                LedgerLine {
                    konto: "7200".to_string(),
                    side: Side::Debit,
                    amount: Decimal::from_str("100.00").unwrap(),
                    description: "usluga".to_string(),
                    counterparty_tax_id: None,
                },
                LedgerLine {
                    konto: "2200".to_string(),
                    side: Side::Credit,
                    amount: Decimal::from_str("100.00").unwrap(),
                    description: "usluga".to_string(),
                    counterparty_tax_id: None,
                },
            ],
            vat_rate: Decimal::from_str("25").unwrap(),
            vat_amount: Decimal::ZERO,
            description: "test booking".to_string(),
            doc_date: Some(now),
            booking_date: Some(now),
            status: ProposalStatus::Pending,
            confidence: 0.9,
            ai_reasoning: "pattern match".to_string(),
            approver: None,
            approved_at: None,
            erp_target: "CPP".to_string(),
            rejection_reason: None,
            exported_flag: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_fetch_round_trips() {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        let repo = BookingRepository::new(store.pool.clone());
        let proposal = sample_proposal("bk_1");
        repo.save(&proposal).await.unwrap();

        let fetched = repo.get("bk_1").await.unwrap().unwrap();
        assert_eq!(fetched.client_id, "K001");
        assert_eq!(fetched.lines.len(), 2);
        assert_eq!(fetched.status, ProposalStatus::Pending);
    }

    #[tokio::test]
    async fn approve_only_transitions_a_pending_row() {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        let repo = BookingRepository::new(store.pool.clone());
        repo.save(&sample_proposal("bk_2")).await.unwrap();

        assert!(repo.approve("bk_2", "ana").await.unwrap());
        assert!(!repo.approve("bk_2", "ana").await.unwrap());
    }

    #[tokio::test]
    async fn list_pending_is_ordered_by_creation() {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        let repo = BookingRepository::new(store.pool.clone());
        repo.save(&sample_proposal("bk_a")).await.unwrap();
        repo.save(&sample_proposal("bk_b")).await.unwrap();

        let pending = repo.list_pending(None).await.unwrap();
        assert_eq!(pending.len(), 2);
    }
}
