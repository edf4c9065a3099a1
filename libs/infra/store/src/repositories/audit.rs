//! [libs/infra/store/src/repositories/audit.rs]
//! Append-only audit trail. Every write is an insert; there is no
//! update or delete path, by design — corrections land as new rows.

use chrono::{DateTime, Utc};
use libsql::params;
use nyx_domain_models::audit::{AuditEntry, AuditEvent, Severity};
use std::collections::BTreeMap;
use tracing::instrument;

use crate::errors::StoreError;
use crate::pool::StorePool;

#[derive(Clone)]
pub struct AuditRepository {
    pool: StorePool,
}

fn event_str(event: AuditEvent) -> &'static str {
    match event {
        AuditEvent::Auth => "auth",
        AuditEvent::Booking => "booking",
        AuditEvent::Approval => "approval",
        AuditEvent::Correction => "correction",
        AuditEvent::Export => "export",
        AuditEvent::Security => "security",
    }
}

fn event_from_str(s: &str) -> AuditEvent {
    match s {
        "booking" => AuditEvent::Booking,
        "approval" => AuditEvent::Approval,
        "correction" => AuditEvent::Correction,
        "export" => AuditEvent::Export,
        "security" => AuditEvent::Security,
        _ => AuditEvent::Auth,
    }
}

fn severity_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Critical => "critical",
    }
}

fn severity_from_str(s: &str) -> Severity {
    match s {
        "warning" => Severity::Warning,
        "critical" => Severity::Critical,
        _ => Severity::Info,
    }
}

fn row_to_entry(row: &libsql::Row) -> Result<AuditEntry, StoreError> {
    let details_json: Option<String> = row.get(6).map_err(|e| StoreError::Mapping(e.to_string()))?;
    let details: BTreeMap<String, String> = details_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| StoreError::Mapping(e.to_string()))?
        .unwrap_or_default();

    let ts: String = row.get(1).map_err(|e| StoreError::Mapping(e.to_string()))?;

    Ok(AuditEntry {
        id: row.get(0).map_err(|e| StoreError::Mapping(e.to_string()))?,
        ts: DateTime::parse_from_rfc3339(&ts)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        event: event_from_str(&row.get::<String>(2).map_err(|e| StoreError::Mapping(e.to_string()))?),
        user_id: row.get::<Option<String>>(3).map_err(|e| StoreError::Mapping(e.to_string()))?.unwrap_or_default(),
        client_id: row.get(4).map_err(|e| StoreError::Mapping(e.to_string()))?,
        action: row.get(5).map_err(|e| StoreError::Mapping(e.to_string()))?,
        details,
        severity: severity_from_str(&row.get::<String>(7).map_err(|e| StoreError::Mapping(e.to_string()))?),
        booking_id: row.get(8).map_err(|e| StoreError::Mapping(e.to_string()))?,
        fingerprint: row.get(9).map_err(|e| StoreError::Mapping(e.to_string()))?,
        chain_hash: row.get(10).map_err(|e| StoreError::Mapping(e.to_string()))?,
    })
}

const SELECT_COLUMNS: &str =
    "id, ts, event, user_id, client_id, action, details_json, severity, booking_id, fingerprint, chain_hash";

impl AuditRepository {
    pub fn new(pool: StorePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, details))]
    pub async fn log(
        &self,
        event: AuditEvent,
        user_id: &str,
        client_id: Option<&str>,
        action: &str,
        details: &BTreeMap<String, String>,
        severity: Severity,
        booking_id: Option<&str>,
        fingerprint: Option<&str>,
        chain_hash: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.pool.acquire().await?;
        let details_json = serde_json::to_string(details).map_err(|e| StoreError::Mapping(e.to_string()))?;

        conn.execute(
            "INSERT INTO audit_log
                (ts, event, user_id, client_id, action, details_json, severity, booking_id, fingerprint, chain_hash)
             VALUES (datetime('now'), ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event_str(event).to_string(),
                user_id.to_string(),
                client_id.map(|s| s.to_string()),
                action.to_string(),
                details_json,
                severity_str(severity).to_string(),
                booking_id.map(|s| s.to_string()),
                fingerprint.map(|s| s.to_string()),
                chain_hash.map(|s| s.to_string()),
            ],
        )
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        user_id: Option<&str>,
        client_id: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let conn = self.pool.acquire().await?;
        let mut clauses = Vec::new();
        let mut values: Vec<libsql::Value> = Vec::new();

        if let Some(u) = user_id {
            values.push(libsql::Value::Text(u.to_string()));
            clauses.push(format!("user_id = ?{}", values.len()));
        }
        if let Some(c) = client_id {
            values.push(libsql::Value::Text(c.to_string()));
            clauses.push(format!("client_id = ?{}", values.len()));
        }
        if let Some(s) = since {
            values.push(libsql::Value::Text(s.to_rfc3339()));
            clauses.push(format!("ts >= ?{}", values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        values.push(libsql::Value::Integer(limit));
        let limit_placeholder = values.len();

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM audit_log {where_clause} ORDER BY ts DESC LIMIT ?{limit_placeholder}"
        );

        let mut rows = conn.query(&sql, values).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_entry(&row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoreClient;

    #[tokio::test]
    async fn log_then_list_round_trips() {
        let store = StoreClient::connect("file::memory:?cache=shared").await.unwrap();
        let repo = AuditRepository::new(store.pool.clone());
        let mut details = BTreeMap::new();
        details.insert("reason".to_string(), "manual test".to_string());

        repo.log(
            AuditEvent::Booking,
            "ana",
            Some("K001"),
            "booking.created",
            &details,
            Severity::Info,
            Some("bk_1"),
            None,
            None,
        )
        .await
        .unwrap();

        let entries = repo.list(None, Some("K001"), None, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "booking.created");
        assert_eq!(entries[0].details.get("reason").unwrap(), "manual test");
    }
}
