//! [apps/control-plane/src/services/proposal_pipeline.rs]
//! In-memory fast path over the pending proposals, write-through
//! to the store on every mutation. The cache is never the source of
//! truth — `restore()` rebuilds it from the store on startup.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::Utc;
use nyx_domain_models::ledger::{BookingProposal, LedgerLine, ProposalStatus};
use nyx_domain_models::{AuditEvent, NyxError, Severity};
use nyx_infra_store::{AuditRepository, BookingRepository, CorrectionRepository};
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// What an operator submits when correcting a pending proposal's konto.
#[derive(Debug, Clone)]
pub struct CorrectionInput {
    pub original_konto: String,
    pub corrected_konto: String,
    pub supplier: String,
}

pub struct ProposalPipeline {
    /// Pending proposals only — approved/rejected/exported rows live in the
    /// store and are queried directly from there.
    cache: Mutex<HashMap<String, BookingProposal>>,
    booking_repo: BookingRepository,
    audit_repo: AuditRepository,
    correction_repo: CorrectionRepository,
}

impl ProposalPipeline {
    pub fn new(booking_repo: BookingRepository, audit_repo: AuditRepository, correction_repo: CorrectionRepository) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            booking_repo,
            audit_repo,
            correction_repo,
        }
    }

    /// Scans `bookings` where `status='pending'` and rebuilds the cache
    /// (`list_pending()` must equal the pre-restart value after a restart).
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<usize, NyxError> {
        let pending = self.booking_repo.list_pending(None).await.map_err(NyxError::from)?;
        let count = pending.len();
        let mut cache = self.cache.lock().await;
        cache.clear();
        for proposal in pending {
            cache.insert(proposal.id.clone(), proposal);
        }
        info!("♻️ [PROPOSAL_PIPELINE]: restored {count} pending proposals from the store");
        Ok(count)
    }

    /// `submit(proposal)`: balance-validated before it ever reaches
    /// the store (scenario 4 — a failing proposal is never persisted).
    #[instrument(skip(self, proposal))]
    pub async fn submit(&self, mut proposal: BookingProposal, user: &str) -> Result<String, NyxError> {
        let date_present = proposal.booking_date.is_some() || proposal.doc_date.is_some();
        nyx_core_ledger::validate_lines(&proposal.lines, date_present, &proposal.description)
            .map_err(|e| NyxError::BalanceError(e.0.join("; ")))?;

        proposal.status = ProposalStatus::Pending;
        proposal.created_at = Utc::now();
        proposal.updated_at = proposal.created_at;

        self.booking_repo.save(&proposal).await.map_err(NyxError::from)?;

        let mut cache = self.cache.lock().await;
        cache.insert(proposal.id.clone(), proposal.clone());
        drop(cache);

        self.log_audit(AuditEvent::Booking, user, Some(&proposal.client_id), "booking.submitted", Some(&proposal.id), Severity::Info)
            .await?;

        Ok(proposal.id)
    }

    /// `approve(id, user)`. Fails `InvalidState` unless the proposal
    /// is currently `pending`. Removes the now-decided row from the hot
    /// cache; callers that also need ledger commit do so after this returns.
    /// A proposal no longer in the cache (already decided) is re-fetched
    /// from the store so a repeat call reports `InvalidState`, not
    /// `NotFound` — the cache only ever holds the `pending` subset.
    #[instrument(skip(self))]
    pub async fn approve(&self, id: &str, user: &str) -> Result<BookingProposal, NyxError> {
        let mut cache = self.cache.lock().await;
        let mut proposal = match cache.get(id).cloned() {
            Some(proposal) => proposal,
            None => {
                drop(cache);
                let stored = self
                    .booking_repo
                    .get(id)
                    .await
                    .map_err(NyxError::from)?
                    .ok_or_else(|| NyxError::NotFound(format!("proposal '{id}'")))?;
                cache = self.cache.lock().await;
                stored
            }
        };

        if proposal.status != ProposalStatus::Pending {
            return Err(NyxError::InvalidState(format!("proposal '{id}' is not pending")));
        }

        let changed = self.booking_repo.approve(id, user).await.map_err(NyxError::from)?;
        if !changed {
            return Err(NyxError::InvalidState(format!("proposal '{id}' was already decided")));
        }

        proposal.status = ProposalStatus::Approved;
        proposal.approver = Some(user.to_string());
        proposal.approved_at = Some(Utc::now());
        cache.remove(id);
        drop(cache);

        self.log_audit(AuditEvent::Approval, user, Some(&proposal.client_id), "booking.approved", Some(id), Severity::Info)
            .await?;

        Ok(proposal)
    }

    /// Same store-fallback lookup as `approve` — a repeat call on an
    /// already-decided id reports `InvalidState`, not `NotFound`.
    #[instrument(skip(self))]
    pub async fn reject(&self, id: &str, user: &str, reason: &str) -> Result<BookingProposal, NyxError> {
        let mut cache = self.cache.lock().await;
        let mut proposal = match cache.get(id).cloned() {
            Some(proposal) => proposal,
            None => {
                drop(cache);
                let stored = self
                    .booking_repo
                    .get(id)
                    .await
                    .map_err(NyxError::from)?
                    .ok_or_else(|| NyxError::NotFound(format!("proposal '{id}'")))?;
                cache = self.cache.lock().await;
                stored
            }
        };

        if proposal.status != ProposalStatus::Pending {
            return Err(NyxError::InvalidState(format!("proposal '{id}' is not pending")));
        }

        let changed = self.booking_repo.reject(id, reason).await.map_err(NyxError::from)?;
        if !changed {
            return Err(NyxError::InvalidState(format!("proposal '{id}' was already decided")));
        }

        proposal.status = ProposalStatus::Rejected;
        proposal.rejection_reason = Some(reason.to_string());
        cache.remove(id);
        drop(cache);

        self.log_audit(AuditEvent::Booking, user, Some(&proposal.client_id), "booking.rejected", Some(id), Severity::Info)
            .await?;

        Ok(proposal)
    }

    /// `correct(id, user, correction)`: records the (original,
    /// corrected) konto pair and rewrites the pending proposal's lines — it
    /// does not itself advance the status; the operator must still approve.
    /// Same store-fallback lookup as `approve`/`reject`: the cache only
    /// ever holds `pending` rows, so a miss means the id is either unknown
    /// (`NotFound`) or already decided (`InvalidState`), never the same
    /// "not found" for both.
    #[instrument(skip(self, correction))]
    pub async fn correct(&self, id: &str, user: &str, correction: CorrectionInput) -> Result<BookingProposal, NyxError> {
        let mut cache = self.cache.lock().await;
        if !cache.contains_key(id) {
            drop(cache);
            self.booking_repo
                .get(id)
                .await
                .map_err(NyxError::from)?
                .ok_or_else(|| NyxError::NotFound(format!("proposal '{id}'")))?;
            return Err(NyxError::InvalidState(format!("proposal '{id}' is not pending")));
        }
        let proposal = cache.get_mut(id).expect("checked present above");

        if proposal.status != ProposalStatus::Pending {
            return Err(NyxError::InvalidState(format!("proposal '{id}' is not pending")));
        }

        let new_lines: Vec<LedgerLine> = proposal
            .lines
            .iter()
            .map(|line| {
                let mut line = line.clone();
                if line.konto == correction.original_konto {
                    line.konto = correction.corrected_konto.clone();
                }
                line
            })
            .collect();

        self.booking_repo.apply_correction(id, &new_lines).await.map_err(NyxError::from)?;
        self.correction_repo
            .record(
                id,
                user,
                &proposal.client_id,
                &correction.original_konto,
                &correction.corrected_konto,
                &proposal.doc_type,
                &correction.supplier,
                &proposal.description,
            )
            .await
            .map_err(NyxError::from)?;

        proposal.lines = new_lines;
        proposal.updated_at = Utc::now();
        let snapshot = proposal.clone();
        let client_id = snapshot.client_id.clone();
        drop(cache);

        self.log_audit(AuditEvent::Correction, user, Some(&client_id), "booking.corrected", Some(id), Severity::Info)
            .await?;

        Ok(snapshot)
    }

    #[instrument(skip(self))]
    pub async fn list_pending(&self, client: Option<&str>) -> Vec<BookingProposal> {
        let cache = self.cache.lock().await;
        let mut out: Vec<BookingProposal> = cache
            .values()
            .filter(|p| client.map_or(true, |c| p.client_id == c))
            .cloned()
            .collect();
        out.sort_by_key(|p| p.created_at);
        out
    }

    #[instrument(skip(self))]
    pub async fn list_approved(&self, client: &str) -> Result<Vec<BookingProposal>, NyxError> {
        self.booking_repo.list_approved_unexported(client).await.map_err(NyxError::from)
    }

    /// `export_approved(client, erp, fmt)`: the caller (handler) has
    /// already invoked the external ERP emitter; this only flips the flags,
    /// and only once, in a single write (partial success is not permitted).
    #[instrument(skip(self, ids))]
    pub async fn mark_exported(&self, ids: &[String], user: &str, client: &str) -> Result<(), NyxError> {
        self.booking_repo.mark_exported(ids).await.map_err(NyxError::from)?;
        let mut details = BTreeMap::new();
        details.insert("count".to_string(), ids.len().to_string());
        self.audit_repo
            .log(AuditEvent::Export, user, Some(client), "bookings.exported", &details, Severity::Info, None, None, None)
            .await
            .map_err(NyxError::from)?;
        Ok(())
    }

    async fn log_audit(
        &self,
        event: AuditEvent,
        user: &str,
        client: Option<&str>,
        action: &str,
        booking_id: Option<&str>,
        severity: Severity,
    ) -> Result<(), NyxError> {
        self.audit_repo
            .log(event, user, client, action, &BTreeMap::new(), severity, booking_id, None, None)
            .await
            .map_err(NyxError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nyx_domain_models::ledger::Side;
    use nyx_infra_store::StoreClient;
    use std::str::FromStr;

    async fn pipeline() -> ProposalPipeline {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        ProposalPipeline::new(
            BookingRepository::new(store.pool.clone()),
            AuditRepository::new(store.pool.clone()),
            CorrectionRepository::new(store.pool.clone()),
        )
    }

    fn balanced_proposal(id: &str) -> BookingProposal {
        let now = Utc::now();
        BookingProposal {
            id: id.to_string(),
            client_id: "K001".to_string(),
            doc_type: "invoice".to_string(),
            lines: vec![
                LedgerLine {
                    konto: "7800".to_string(),
                    side: Side::Debit,
                    amount: rust_decimal::Decimal::from_str("100.00").unwrap(),
                    description: "usluga".to_string(),
                    counterparty_tax_id: None,
                },
                LedgerLine {
                    konto: "2200".to_string(),
                    side: Side::Credit,
                    amount: rust_decimal::Decimal::from_str("100.00").unwrap(),
                    description: "usluga".to_string(),
                    counterparty_tax_id: None,
                },
            ],
            vat_rate: rust_decimal::Decimal::ZERO,
            vat_amount: rust_decimal::Decimal::ZERO,
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
    async fn submit_rejects_unbalanced_lines_before_persisting() {
        let pipe = pipeline().await;
        let mut proposal = balanced_proposal("bk_unbalanced");
        proposal.lines[1].amount = rust_decimal::Decimal::from_str("99.99").unwrap();

        let err = pipe.submit(proposal, "ana").await.unwrap_err();
        assert!(matches!(err, NyxError::BalanceError(_)));
        assert!(pipe.list_pending(None).await.is_empty());
    }

    #[tokio::test]
    async fn submit_then_approve_moves_out_of_the_pending_cache() {
        let pipe = pipeline().await;
        let id = pipe.submit(balanced_proposal("bk_1"), "ana").await.unwrap();
        assert_eq!(pipe.list_pending(None).await.len(), 1);

        let approved = pipe.approve(&id, "ana").await.unwrap();
        assert_eq!(approved.status, ProposalStatus::Approved);
        assert!(pipe.list_pending(None).await.is_empty());
    }

    #[tokio::test]
    async fn approve_on_a_non_pending_proposal_fails_invalid_state() {
        let pipe = pipeline().await;
        let id = pipe.submit(balanced_proposal("bk_2"), "ana").await.unwrap();
        pipe.approve(&id, "ana").await.unwrap();

        let err = pipe.approve(&id, "ana").await.unwrap_err();
        assert!(matches!(err, NyxError::InvalidState(_)));
    }

    #[tokio::test]
    async fn reject_is_terminal() {
        let pipe = pipeline().await;
        let id = pipe.submit(balanced_proposal("bk_3"), "ana").await.unwrap();
        let rejected = pipe.reject(&id, "ana", "pogrešan konto").await.unwrap();
        assert_eq!(rejected.status, ProposalStatus::Rejected);
        assert!(pipe.list_pending(None).await.is_empty());

        let err = pipe.reject(&id, "ana", "again").await.unwrap_err();
        assert!(matches!(err, NyxError::InvalidState(_)));
    }

    #[tokio::test]
    async fn approve_on_an_unknown_id_is_not_found() {
        let pipe = pipeline().await;
        let err = pipe.approve("does-not-exist", "ana").await.unwrap_err();
        assert!(matches!(err, NyxError::NotFound(_)));
    }

    #[tokio::test]
    async fn correct_on_an_already_decided_proposal_is_invalid_state() {
        let pipe = pipeline().await;
        let id = pipe.submit(balanced_proposal("bk_7"), "ana").await.unwrap();
        pipe.approve(&id, "ana").await.unwrap();

        let err = pipe
            .correct(
                &id,
                "ana",
                CorrectionInput {
                    original_konto: "7800".to_string(),
                    corrected_konto: "7200".to_string(),
                    supplier: "HEP".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NyxError::InvalidState(_)));
    }

    #[tokio::test]
    async fn correct_rewrites_konto_and_keeps_the_proposal_pending() {
        let pipe = pipeline().await;
        let id = pipe.submit(balanced_proposal("bk_4"), "ana").await.unwrap();

        let corrected = pipe
            .correct(
                &id,
                "ana",
                CorrectionInput {
                    original_konto: "7800".to_string(),
                    corrected_konto: "7200".to_string(),
                    supplier: "HEP".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(corrected.status, ProposalStatus::Pending);
        assert!(corrected.lines.iter().any(|l| l.konto == "7200"));
        assert_eq!(pipe.list_pending(None).await.len(), 1);

        let approved = pipe.approve(&id, "ana").await.unwrap();
        assert_eq!(approved.status, ProposalStatus::Approved);
    }

    #[tokio::test]
    async fn restore_rebuilds_the_pending_cache_from_the_store() {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        let pipe = ProposalPipeline::new(
            BookingRepository::new(store.pool.clone()),
            AuditRepository::new(store.pool.clone()),
            CorrectionRepository::new(store.pool.clone()),
        );
        pipe.submit(balanced_proposal("bk_5"), "ana").await.unwrap();
        pipe.submit(balanced_proposal("bk_6"), "ana").await.unwrap();

        let fresh = ProposalPipeline::new(
            BookingRepository::new(store.pool.clone()),
            AuditRepository::new(store.pool.clone()),
            CorrectionRepository::new(store.pool.clone()),
        );
        let restored = fresh.restore().await.unwrap();
        assert_eq!(restored, 2);
        assert_eq!(fresh.list_pending(None).await.len(), 2);
    }
}
