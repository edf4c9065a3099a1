//! [libs/infra/store/src/repositories/client.rs]
//! CRUD for the client registry (3). Backs document routing and the booking
//! pipeline's client-matching pass.

use chrono::{DateTime, Utc};
use libsql::params;
use nyx_domain_models::client::Client;
use tracing::instrument;

use crate::errors::StoreError;
use crate::pool::StorePool;

#[derive(Clone)]
pub struct ClientRepository {
    pool: StorePool,
}

fn row_to_client(row: &libsql::Row) -> Result<Client, StoreError> {
    let ibans_json: String = row.get(3).map_err(|e| StoreError::Mapping(e.to_string()))?;
    let aliases_json: String = row.get(8).map_err(|e| StoreError::Mapping(e.to_string()))?;
    let created_at: String = row.get(10).map_err(|e| StoreError::Mapping(e.to_string()))?;

    Ok(Client {
        id: row.get(0).map_err(|e| StoreError::Mapping(e.to_string()))?,
        legal_name: row.get(1).map_err(|e| StoreError::Mapping(e.to_string()))?,
        tax_id: row.get::<Option<String>>(2).map_err(|e| StoreError::Mapping(e.to_string()))?.unwrap_or_default(),
        ibans: serde_json::from_str(&ibans_json).map_err(|e| StoreError::Mapping(e.to_string()))?,
        erp_target: row.get(4).map_err(|e| StoreError::Mapping(e.to_string()))?,
        erp_format: row.get(5).map_err(|e| StoreError::Mapping(e.to_string()))?,
        vat_period: row.get(6).map_err(|e| StoreError::Mapping(e.to_string()))?,
        size_category: row.get(7).map_err(|e| StoreError::Mapping(e.to_string()))?,
        aliases: serde_json::from_str(&aliases_json).map_err(|e| StoreError::Mapping(e.to_string()))?,
        active: row.get::<i64>(9).map_err(|e| StoreError::Mapping(e.to_string()))? != 0,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

const SELECT_COLUMNS: &str =
    "id, legal_name, tax_id, ibans_json, erp_target, erp_format, vat_period, size_category, aliases_json, active, created_at";

impl ClientRepository {
    pub fn new(pool: StorePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, client))]
    pub async fn upsert(&self, client: &Client) -> Result<(), StoreError> {
        let conn = self.pool.acquire().await?;
        let ibans_json = serde_json::to_string(&client.ibans).map_err(|e| StoreError::Mapping(e.to_string()))?;
        let aliases_json = serde_json::to_string(&client.aliases).map_err(|e| StoreError::Mapping(e.to_string()))?;

        conn.execute(
            "INSERT INTO clients
                (id, legal_name, tax_id, ibans_json, aliases_json, erp_target, erp_format,
                 vat_period, size_category, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                legal_name=excluded.legal_name, tax_id=excluded.tax_id, ibans_json=excluded.ibans_json,
                aliases_json=excluded.aliases_json, erp_target=excluded.erp_target,
                erp_format=excluded.erp_format, vat_period=excluded.vat_period,
                size_category=excluded.size_category, active=excluded.active",
            params![
                client.id.clone(),
                client.legal_name.clone(),
                client.tax_id.clone(),
                ibans_json,
                aliases_json,
                client.erp_target.clone(),
                client.erp_format.clone(),
                client.vat_period.clone(),
                client.size_category.clone(),
                client.active as i64,
                client.created_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<Client>, StoreError> {
        let conn = self.pool.acquire().await?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM clients WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_client(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<Client>, StoreError> {
        let conn = self.pool.acquire().await?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM clients WHERE active = 1 ORDER BY legal_name ASC");
        let mut rows = conn.query(&sql, ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_client(&row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoreClient;

    #[tokio::test]
    async fn upsert_then_fetch_round_trips() {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        let repo = ClientRepository::new(store.pool.clone());
        let mut client = Client::new("K001", "Example d.o.o.", "12345678901");
        client.ibans.push("HR1234567890123456789".to_string());
        repo.upsert(&client).await.unwrap();

        let fetched = repo.get("K001").await.unwrap().unwrap();
        assert_eq!(fetched.legal_name, "Example d.o.o.");
        assert_eq!(fetched.ibans.len(), 1);
    }

    #[tokio::test]
    async fn list_active_excludes_disabled_clients() {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        let repo = ClientRepository::new(store.pool.clone());
        let active = Client::new("K001", "Active d.o.o.", "11111111111");
        let mut inactive = Client::new("K002", "Inactive d.o.o.", "22222222222");
        inactive.active = false;
        repo.upsert(&active).await.unwrap();
        repo.upsert(&inactive).await.unwrap();

        let listed = repo.list_active().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "K001");
    }
}
