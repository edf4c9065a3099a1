//! [libs/infra/store/src/client.rs]
//! Opens the embedded store and wires the pool. Mirrors the in-memory
//! anchor trick: SQLite purges an in-memory database once every connection
//! closes, so a `:memory:` URL keeps one anchor connection alive for the
//! lifetime of the process (used by the test suite).

use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use tracing::{info, instrument};

use crate::errors::StoreError;
use crate::pool::{StorePool, DEFAULT_POOL_SIZE};
use crate::schema::apply_schema;

pub struct StoreClient {
    pub pool: StorePool,
    _memory_anchor: Option<Connection>,
}

impl StoreClient {
    #[instrument]
    pub async fn connect(db_path: &str) -> Result<Self, StoreError> {
        Self::connect_with_pool_size(db_path, DEFAULT_POOL_SIZE).await
    }

    pub async fn connect_with_pool_size(db_path: &str, pool_size: usize) -> Result<Self, StoreError> {
        if db_path.is_empty() {
            return Err(StoreError::Configuration("NYX_DB_PATH is empty".to_string()));
        }

        info!("🔌 [STORE]: opening [{}]", db_path);
        let is_memory = db_path.contains(":memory:");

        let database = Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let database = Arc::new(database);

        let mut anchor = None;
        if is_memory {
            let anchor_conn = database.connect().map_err(|e| StoreError::Connection(e.to_string()))?;
            apply_schema(&anchor_conn).await.map_err(|e| StoreError::Configuration(e.to_string()))?;
            anchor = Some(anchor_conn);
        } else {
            let bootstrap = database.connect().map_err(|e| StoreError::Connection(e.to_string()))?;
            apply_schema(&bootstrap).await.map_err(|e| StoreError::Configuration(e.to_string()))?;
        }

        Ok(Self {
            pool: StorePool::new(database, pool_size),
            _memory_anchor: anchor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::BookingRepository;
    use nyx_domain_models::ledger::{BookingProposal, LedgerLine, ProposalStatus, Side};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[tokio::test]
    async fn rejects_an_empty_db_path() {
        let err = StoreClient::connect("").await.unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    /// Scenario 6: three pending proposals submitted, process "restarted"
    /// (store reopened against the same file), `list_pending` equivalent
    /// returns the same three rows.
    #[tokio::test]
    async fn pending_bookings_survive_reopening_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nyx_light.db");
        let db_path_str = db_path.to_str().unwrap();

        {
            let store = StoreClient::connect(db_path_str).await.unwrap();
            let repo = BookingRepository::new(store.pool.clone());
            for id in ["bk_1", "bk_2", "bk_3"] {
                repo.save(&sample_proposal(id)).await.unwrap();
            }
        }

        let reopened = StoreClient::connect(db_path_str).await.unwrap();
        let repo = BookingRepository::new(reopened.pool.clone());
        let pending = repo.list_pending(None).await.unwrap();
        assert_eq!(pending.len(), 3);
        let mut ids: Vec<&str> = pending.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["bk_1", "bk_2", "bk_3"]);
    }

    fn sample_proposal(id: &str) -> BookingProposal {
        let now = chrono::Utc::now();
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
}
