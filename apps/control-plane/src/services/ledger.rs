//! [apps/control-plane/src/services/ledger.rs]
//! Stateful wrapper around `nyx-core-ledger`'s pure functions. Owns
//! the chain mutex: "every commit takes the chain mutex, reads prev_chain,
//! writes the new row in one transaction, and releases" (5).

use chrono::Utc;
use nyx_core_ledger::{chain_hash, fingerprint, trial_balance, validate_lines, verify_chain, ChainBreak, TrialBalance, GENESIS};
use nyx_domain_models::ledger::{BookingProposal, Transaction};
use nyx_domain_models::NyxError;
use nyx_infra_store::TransactionRepository;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct LedgerService {
    tx_repo: TransactionRepository,
    /// Serializes every commit; holds the latest chain hash between calls so
    /// a reload isn't needed per commit.
    chain_state: Mutex<String>,
}

impl LedgerService {
    pub async fn new(tx_repo: TransactionRepository) -> Result<Self, NyxError> {
        let latest = tx_repo.latest_chain_hash().await.map_err(NyxError::from)?;
        Ok(Self {
            tx_repo,
            chain_state: Mutex::new(latest.unwrap_or_else(|| GENESIS.to_string())),
        })
    }

    /// `commit(tx, user)`: validates, fingerprints, links into the chain,
    /// and appends. The proposal id becomes the transaction's
    /// `proposal_id`; a fresh uuid becomes the transaction id.
    #[instrument(skip(self, proposal))]
    pub async fn commit(&self, proposal: &BookingProposal, _user: &str) -> Result<Transaction, NyxError> {
        let date_present = proposal.booking_date.is_some() || proposal.doc_date.is_some();
        validate_lines(&proposal.lines, date_present, &proposal.description)
            .map_err(|e| NyxError::BalanceError(e.0.join("; ")))?;

        let date = proposal.booking_date.or(proposal.doc_date).unwrap_or_else(Utc::now);
        let tx_id = Uuid::new_v4().to_string();
        let doc_ref = proposal.id.clone();

        let fp = fingerprint(&tx_id, &date.to_rfc3339(), &proposal.description, &doc_ref, &proposal.lines);

        let mut chain_guard = self.chain_state.lock().await;
        let new_chain_hash = chain_hash(&chain_guard, &fp);

        let tx = Transaction {
            id: tx_id,
            proposal_id: proposal.id.clone(),
            client_id: proposal.client_id.clone(),
            lines: proposal.lines.clone(),
            description: proposal.description.clone(),
            doc_ref,
            date,
            fingerprint: fp,
            chain_hash: new_chain_hash.clone(),
            reversed: false,
            reverses: None,
        };

        self.tx_repo.append(&tx).await.map_err(NyxError::from)?;
        *chain_guard = new_chain_hash;
        drop(chain_guard);

        info!("⛓️ [LEDGER]: committed tx {} for client {}", tx.id, tx.client_id);
        Ok(tx)
    }

    /// `reverse(tx_id, user, reason)`: appends a compensating transaction
    /// that flips every line's side and references the one it reverses.
    #[instrument(skip(self))]
    pub async fn reverse(&self, tx_id: &str, _user: &str, reason: &str) -> Result<Transaction, NyxError> {
        let original = self
            .tx_repo
            .get(tx_id)
            .await
            .map_err(NyxError::from)?
            .ok_or_else(|| NyxError::NotFound(format!("transaction '{tx_id}'")))?;

        if original.reversed {
            return Err(NyxError::InvalidState(format!("transaction '{tx_id}' is already reversed")));
        }

        let flipped = nyx_core_ledger::flip_lines(&original.lines);
        let reversal_id = Uuid::new_v4().to_string();
        let date = Utc::now();
        let description = format!("reversal: {reason}");

        let fp = fingerprint(&reversal_id, &date.to_rfc3339(), &description, &original.doc_ref, &flipped);

        let mut chain_guard = self.chain_state.lock().await;
        let new_chain_hash = chain_hash(&chain_guard, &fp);

        let reversal = Transaction {
            id: reversal_id,
            proposal_id: original.proposal_id.clone(),
            client_id: original.client_id.clone(),
            lines: flipped,
            description,
            doc_ref: original.doc_ref.clone(),
            date,
            fingerprint: fp,
            chain_hash: new_chain_hash.clone(),
            reversed: false,
            reverses: Some(original.id.clone()),
        };

        self.tx_repo.append(&reversal).await.map_err(NyxError::from)?;
        self.tx_repo.mark_reversed(&original.id).await.map_err(NyxError::from)?;
        *chain_guard = new_chain_hash;
        drop(chain_guard);

        Ok(reversal)
    }

    #[instrument(skip(self))]
    pub async fn trial_balance(&self, through_date: chrono::DateTime<Utc>) -> Result<TrialBalance, NyxError> {
        let transactions = self.tx_repo.list_all_in_chain_order().await.map_err(NyxError::from)?;
        Ok(trial_balance(&transactions, through_date))
    }

    #[instrument(skip(self))]
    pub async fn verify_chain(&self) -> Result<Result<(), ChainBreak>, NyxError> {
        let transactions = self.tx_repo.list_all_in_chain_order().await.map_err(NyxError::from)?;
        let entries: Vec<(String, String)> = transactions
            .iter()
            .map(|t| (t.fingerprint.clone(), t.chain_hash.clone()))
            .collect();
        let result = verify_chain(&entries);
        if let Err(ref broken) = result {
            warn!("⛓️ [LEDGER_FAULT]: chain break at index {}", broken.at_index);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nyx_domain_models::ledger::{LedgerLine, ProposalStatus, Side};
    use nyx_infra_store::StoreClient;
    use std::str::FromStr;

    async fn ledger() -> LedgerService {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        LedgerService::new(TransactionRepository::new(store.pool.clone())).await.unwrap()
    }

    fn balanced_proposal(id: &str) -> BookingProposal {
        let now = Utc::now();
        BookingProposal {
            id: id.to_string(),
            client_id: "K001".to_string(),
            doc_type: "invoice".to_string(),
            lines: vec![
                LedgerLine {
                    konto: "7200".to_string(),
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
            status: ProposalStatus::Approved,
            confidence: 0.9,
            ai_reasoning: "pattern match".to_string(),
            approver: Some("ana".to_string()),
            approved_at: Some(now),
            erp_target: "CPP".to_string(),
            rejection_reason: None,
            exported_flag: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn first_commit_chains_from_genesis() {
        let svc = ledger().await;
        let tx = svc.commit(&balanced_proposal("bk_1"), "ana").await.unwrap();
        let expected_fp = fingerprint(&tx.id, &tx.date.to_rfc3339(), &tx.description, &tx.doc_ref, &tx.lines);
        assert_eq!(tx.fingerprint, expected_fp);
        assert_eq!(tx.chain_hash, chain_hash(GENESIS, &expected_fp));
    }

    #[tokio::test]
    async fn successive_commits_extend_the_chain() {
        let svc = ledger().await;
        let tx1 = svc.commit(&balanced_proposal("bk_1"), "ana").await.unwrap();
        let tx2 = svc.commit(&balanced_proposal("bk_2"), "ana").await.unwrap();
        assert_eq!(tx2.chain_hash, chain_hash(&tx1.chain_hash, &tx2.fingerprint));

        let verified = svc.verify_chain().await.unwrap();
        assert!(verified.is_ok());
    }

    #[tokio::test]
    async fn commit_rejects_an_unbalanced_proposal_without_persisting() {
        let svc = ledger().await;
        let mut proposal = balanced_proposal("bk_bad");
        proposal.lines[1].amount = rust_decimal::Decimal::from_str("99.99").unwrap();

        let err = svc.commit(&proposal, "ana").await.unwrap_err();
        assert!(matches!(err, NyxError::BalanceError(_)));

        let tb = svc.trial_balance(Utc::now()).await.unwrap();
        assert!(tb.per_konto.is_empty());
    }

    #[tokio::test]
    async fn reverse_flips_lines_and_restores_the_trial_balance() {
        let svc = ledger().await;
        let tx = svc.commit(&balanced_proposal("bk_1"), "ana").await.unwrap();

        let before = svc.trial_balance(Utc::now()).await.unwrap();
        assert_eq!(before.per_konto["7200"].balance, rust_decimal::Decimal::from_str("100.00").unwrap());

        svc.reverse(&tx.id, "ana", "pogrešan konto").await.unwrap();

        let after = svc.trial_balance(Utc::now()).await.unwrap();
        assert_eq!(after.per_konto["7200"].balance, rust_decimal::Decimal::ZERO);
        assert_eq!(after.per_konto["2200"].balance, rust_decimal::Decimal::ZERO);
    }

    #[tokio::test]
    async fn reversing_an_already_reversed_transaction_fails() {
        let svc = ledger().await;
        let tx = svc.commit(&balanced_proposal("bk_1"), "ana").await.unwrap();
        svc.reverse(&tx.id, "ana", "prvi put").await.unwrap();

        let err = svc.reverse(&tx.id, "ana", "drugi put").await.unwrap_err();
        assert!(matches!(err, NyxError::InvalidState(_)));
    }
}
