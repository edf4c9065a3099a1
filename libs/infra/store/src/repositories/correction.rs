//! [libs/infra/store/src/repositories/correction.rs]
//! Operator corrections. Each row is the (original_konto,
//! corrected_konto) pair the nightly preference-pair export turns into a
//! (chosen, rejected) tuple.

use chrono::{DateTime, Utc};
use libsql::params;
use nyx_domain_models::ledger::Correction;
use tracing::instrument;

use crate::errors::StoreError;
use crate::pool::StorePool;

#[derive(Clone)]
pub struct CorrectionRepository {
    pool: StorePool,
}

fn row_to_correction(row: &libsql::Row) -> Result<Correction, StoreError> {
    let created_at: String = row.get(9).map_err(|e| StoreError::Mapping(e.to_string()))?;
    Ok(Correction {
        id: row.get(0).map_err(|e| StoreError::Mapping(e.to_string()))?,
        booking_id: row.get(1).map_err(|e| StoreError::Mapping(e.to_string()))?,
        user_id: row.get(2).map_err(|e| StoreError::Mapping(e.to_string()))?,
        client_id: row.get(3).map_err(|e| StoreError::Mapping(e.to_string()))?,
        original_konto: row.get(4).map_err(|e| StoreError::Mapping(e.to_string()))?,
        corrected_konto: row.get(5).map_err(|e| StoreError::Mapping(e.to_string()))?,
        doc_type: row.get::<Option<String>>(6).map_err(|e| StoreError::Mapping(e.to_string()))?.unwrap_or_default(),
        supplier: row.get::<Option<String>>(7).map_err(|e| StoreError::Mapping(e.to_string()))?.unwrap_or_default(),
        description: row.get::<Option<String>>(8).map_err(|e| StoreError::Mapping(e.to_string()))?.unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

const SELECT_COLUMNS: &str =
    "id, booking_id, user_id, client_id, original_konto, corrected_konto, doc_type, supplier, description, created_at";

impl CorrectionRepository {
    pub fn new(pool: StorePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        booking_id: &str,
        user_id: &str,
        client_id: &str,
        original_konto: &str,
        corrected_konto: &str,
        doc_type: &str,
        supplier: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        let conn = self.pool.acquire().await?;
        conn.execute(
            "INSERT INTO corrections
                (booking_id, user_id, client_id, original_konto, corrected_konto, doc_type, supplier, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))",
            params![
                booking_id.to_string(),
                user_id.to_string(),
                client_id.to_string(),
                original_konto.to_string(),
                corrected_konto.to_string(),
                doc_type.to_string(),
                supplier.to_string(),
                description.to_string(),
            ],
        )
        .await?;
        Ok(())
    }

    /// Corrections recorded on `day` (local calendar date), feeding the
    /// 02:00 nightly preference-pair export.
    #[instrument(skip(self))]
    pub async fn list_for_date(&self, day: chrono::NaiveDate) -> Result<Vec<Correction>, StoreError> {
        let conn = self.pool.acquire().await?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM corrections WHERE date(created_at) = ?1 ORDER BY created_at ASC");
        let mut rows = conn.query(&sql, params![day.format("%Y-%m-%d").to_string()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_correction(&row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoreClient;

    #[tokio::test]
    async fn record_then_list_for_date_round_trips() {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        let repo = CorrectionRepository::new(store.pool.clone());
        repo.record("bk_1", "ana", "K001", "7800", "7200", "invoice", "HEP", "reclassified")
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        let rows = repo.list_for_date(today).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].corrected_konto, "7200");
    }
}
