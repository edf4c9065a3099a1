//! [libs/domain/models/src/session.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// In-memory only; never persisted. A restart does not restore sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub active_client_id: Option<String>,
    pub message_count: u64,
    pub proposals_count: u64,
    pub approvals_count: u64,
}

impl Session {
    pub const TIMEOUT_MINUTES: i64 = 60;

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_active).num_minutes() >= Self::TIMEOUT_MINUTES
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_active = now;
    }
}
