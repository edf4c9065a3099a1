//! [libs/infra/store/src/schema.rs]
//! Schema application. WAL journaling, foreign keys on, idempotent
//! `CREATE TABLE IF NOT EXISTS` plus accelerating indexes.

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

const PRAGMAS: &[&str] = &["PRAGMA journal_mode=WAL", "PRAGMA foreign_keys=ON"];

const TABLES: &[(&str, &str)] = &[
    (
        "bookings",
        r#"
        CREATE TABLE IF NOT EXISTS bookings (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            konto_debit TEXT,
            konto_credit TEXT,
            lines_json TEXT NOT NULL,
            amount TEXT NOT NULL DEFAULT '0',
            vat_rate TEXT DEFAULT '25',
            vat_amount TEXT DEFAULT '0',
            description TEXT,
            counterparty_tax_id TEXT,
            doc_date TEXT,
            booking_date TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            confidence REAL DEFAULT 0,
            ai_reasoning TEXT,
            approver TEXT,
            approved_at TEXT,
            erp_target TEXT DEFAULT 'CPP',
            rejection_reason TEXT,
            exported_flag INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    "#,
    ),
    (
        "corrections",
        r#"
        CREATE TABLE IF NOT EXISTS corrections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            booking_id TEXT,
            user_id TEXT NOT NULL,
            client_id TEXT NOT NULL,
            original_konto TEXT,
            corrected_konto TEXT,
            doc_type TEXT,
            supplier TEXT,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    "#,
    ),
    (
        "audit_log",
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ts TEXT NOT NULL DEFAULT (datetime('now')),
            event TEXT NOT NULL,
            user_id TEXT,
            client_id TEXT,
            action TEXT NOT NULL,
            details_json TEXT,
            severity TEXT NOT NULL DEFAULT 'info',
            booking_id TEXT,
            fingerprint TEXT,
            chain_hash TEXT
        );
    "#,
    ),
    (
        "clients",
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            legal_name TEXT NOT NULL,
            tax_id TEXT UNIQUE,
            ibans_json TEXT NOT NULL DEFAULT '[]',
            aliases_json TEXT NOT NULL DEFAULT '[]',
            erp_target TEXT DEFAULT 'CPP',
            erp_format TEXT DEFAULT 'csv',
            vat_period TEXT DEFAULT 'monthly',
            size_category TEXT DEFAULT 'small',
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    "#,
    ),
    (
        "transactions",
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            proposal_id TEXT NOT NULL,
            client_id TEXT NOT NULL,
            lines_json TEXT NOT NULL,
            description TEXT,
            doc_ref TEXT,
            tx_date TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            chain_hash TEXT NOT NULL,
            reversed INTEGER NOT NULL DEFAULT 0,
            reverses TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    "#,
    ),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_bookings_client", "CREATE INDEX IF NOT EXISTS idx_bookings_client ON bookings(client_id);"),
    ("idx_bookings_status", "CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(client_id, status);"),
    ("idx_corrections_client", "CREATE INDEX IF NOT EXISTS idx_corrections_client ON corrections(client_id);"),
    ("idx_corrections_created", "CREATE INDEX IF NOT EXISTS idx_corrections_created ON corrections(created_at);"),
    ("idx_audit_user", "CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_log(user_id);"),
    ("idx_audit_ts", "CREATE INDEX IF NOT EXISTS idx_audit_ts ON audit_log(ts);"),
    ("idx_tx_chain", "CREATE INDEX IF NOT EXISTS idx_tx_chain ON transactions(created_at);"),
];

#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA]: applying store schema");

    for pragma in PRAGMAS {
        conn.execute(pragma, ()).await.with_context(|| format!("pragma failed: {pragma}"))?;
    }

    for (name, sql) in TABLES {
        debug!("  ↳ table: {}", name);
        conn.execute(sql, ()).await.with_context(|| format!("table creation failed: {name}"))?;
    }

    for (name, sql) in INDEXES {
        debug!("  ↳ index: {}", name);
        conn.execute(sql, ()).await.with_context(|| format!("index creation failed: {name}"))?;
    }

    info!("✅ [SCHEMA]: store schema level");
    Ok(())
}
