//! [libs/domain/models/src/notification.rs]
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

/// Who a notification is addressed to. `Broadcast` fans out to every
/// connected session; the others target exactly one user or role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    Broadcast,
    User(String),
    Role(String),
}

/// In-memory only; a user's deque is the source of truth for unread state.
/// Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub module: Option<String>,
    pub data: BTreeMap<String, String>,
    pub priority: NotificationPriority,
    pub read: bool,
    pub timestamp: DateTime<Utc>,
}
