//! [libs/infra/store/src/repositories/transaction.rs]
//! Committed ledger entries. Append-only; `reverses` carries the
//! compensating-transaction link instead of ever mutating a prior row.

use chrono::{DateTime, NaiveDate, Utc};
use libsql::params;
use nyx_domain_models::ledger::{LedgerLine, Transaction};
use tracing::instrument;

use crate::errors::StoreError;
use crate::pool::StorePool;

#[derive(Clone)]
pub struct TransactionRepository {
    pool: StorePool,
}

fn row_to_transaction(row: &libsql::Row) -> Result<Transaction, StoreError> {
    let lines_json: String = row.get(3).map_err(|e| StoreError::Mapping(e.to_string()))?;
    let lines: Vec<LedgerLine> = serde_json::from_str(&lines_json).map_err(|e| StoreError::Mapping(e.to_string()))?;
    let date_str: String = row.get(6).map_err(|e| StoreError::Mapping(e.to_string()))?;

    Ok(Transaction {
        id: row.get(0).map_err(|e| StoreError::Mapping(e.to_string()))?,
        proposal_id: row.get(1).map_err(|e| StoreError::Mapping(e.to_string()))?,
        client_id: row.get(2).map_err(|e| StoreError::Mapping(e.to_string()))?,
        lines,
        description: row.get::<Option<String>>(4).map_err(|e| StoreError::Mapping(e.to_string()))?.unwrap_or_default(),
        doc_ref: row.get::<Option<String>>(5).map_err(|e| StoreError::Mapping(e.to_string()))?.unwrap_or_default(),
        date: DateTime::parse_from_rfc3339(&date_str)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        fingerprint: row.get(7).map_err(|e| StoreError::Mapping(e.to_string()))?,
        chain_hash: row.get(8).map_err(|e| StoreError::Mapping(e.to_string()))?,
        reversed: row.get::<i64>(9).map_err(|e| StoreError::Mapping(e.to_string()))? != 0,
        reverses: row.get(10).map_err(|e| StoreError::Mapping(e.to_string()))?,
    })
}

const SELECT_COLUMNS: &str =
    "id, proposal_id, client_id, lines_json, description, doc_ref, tx_date, fingerprint, chain_hash, reversed, reverses";

impl TransactionRepository {
    pub fn new(pool: StorePool) -> Self {
        Self { pool }
    }

    /// Appends a committed transaction. Never updates an existing row; a
    /// reversal is inserted as its own entry with `reverses` set.
    #[instrument(skip(self, tx))]
    pub async fn append(&self, tx: &Transaction) -> Result<(), StoreError> {
        let conn = self.pool.acquire().await?;
        let lines_json = serde_json::to_string(&tx.lines).map_err(|e| StoreError::Mapping(e.to_string()))?;

        conn.execute(
            "INSERT INTO transactions
                (id, proposal_id, client_id, lines_json, description, doc_ref, tx_date,
                 fingerprint, chain_hash, reversed, reverses, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, datetime('now'))",
            params![
                tx.id.clone(),
                tx.proposal_id.clone(),
                tx.client_id.clone(),
                lines_json,
                tx.description.clone(),
                tx.doc_ref.clone(),
                tx.date.to_rfc3339(),
                tx.fingerprint.clone(),
                tx.chain_hash.clone(),
                tx.reversed as i64,
                tx.reverses.clone(),
            ],
        )
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        let conn = self.pool.acquire().await?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM transactions WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// Flags the given transaction as reversed. Called once, the moment its
    /// compensating entry is appended.
    #[instrument(skip(self))]
    pub async fn mark_reversed(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.pool.acquire().await?;
        let changed = conn
            .execute("UPDATE transactions SET reversed=1 WHERE id=?1", params![id.to_string()])
            .await?;
        Ok(changed > 0)
    }

    #[instrument(skip(self))]
    pub async fn latest_chain_hash(&self) -> Result<Option<String>, StoreError> {
        let conn = self.pool.acquire().await?;
        let mut rows = conn
            .query("SELECT chain_hash FROM transactions ORDER BY created_at DESC, rowid DESC LIMIT 1", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0).map_err(|e| StoreError::Mapping(e.to_string()))?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_for_client(&self, client_id: &str) -> Result<Vec<Transaction>, StoreError> {
        let conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM transactions WHERE client_id = ?1 ORDER BY created_at ASC, rowid ASC"
        );
        let mut rows = conn.query(&sql, params![client_id.to_string()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_transaction(&row)?);
        }
        Ok(out)
    }

    /// All entries in chain order, for `verify_chain` and the trial balance.
    #[instrument(skip(self))]
    pub async fn list_all_in_chain_order(&self) -> Result<Vec<Transaction>, StoreError> {
        let conn = self.pool.acquire().await?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM transactions ORDER BY created_at ASC, rowid ASC");
        let mut rows = conn.query(&sql, ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_transaction(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn list_through_date(&self, through: NaiveDate) -> Result<Vec<Transaction>, StoreError> {
        let all = self.list_all_in_chain_order().await?;
        Ok(all.into_iter().filter(|tx| tx.date.date_naive() <= through).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoreClient;
    use nyx_domain_models::ledger::Side;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn sample_tx(id: &str, prev_hash: &str) -> Transaction {
        let lines = vec![
            LedgerLine {
                konto: "7200".to_string(),
                side: Side::Debit,
                amount: Decimal::from_str("50.00").unwrap(),
                description: "d".to_string(),
                counterparty_tax_id: None,
            },
            LedgerLine {
                konto: "2200".to_string(),
                side: Side::Credit,
                amount: Decimal::from_str("50.00").unwrap(),
                description: "d".to_string(),
                counterparty_tax_id: None,
            },
        ];
        let fingerprint = nyx_core_ledger::chain::fingerprint(id, "2026-01-01", "d", "ref", &lines);
        let chain_hash = nyx_core_ledger::chain::chain_hash(prev_hash, &fingerprint);
        Transaction {
            id: id.to_string(),
            proposal_id: format!("prop_{id}"),
            client_id: "K001".to_string(),
            lines,
            description: "d".to_string(),
            doc_ref: "ref".to_string(),
            date: Utc::now(),
            fingerprint,
            chain_hash,
            reversed: false,
            reverses: None,
        }
    }

    #[tokio::test]
    async fn append_and_fetch_latest_chain_hash() {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        let repo = TransactionRepository::new(store.pool.clone());
        let tx1 = sample_tx("tx_1", nyx_core_ledger::chain::GENESIS);
        repo.append(&tx1).await.unwrap();

        let latest = repo.latest_chain_hash().await.unwrap().unwrap();
        assert_eq!(latest, tx1.chain_hash);
    }

    #[tokio::test]
    async fn mark_reversed_flips_the_flag() {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        let repo = TransactionRepository::new(store.pool.clone());
        let tx1 = sample_tx("tx_a", nyx_core_ledger::chain::GENESIS);
        repo.append(&tx1).await.unwrap();

        assert!(repo.mark_reversed("tx_a").await.unwrap());
        let fetched = repo.list_for_client("K001").await.unwrap();
        assert!(fetched[0].reversed);
    }
}
