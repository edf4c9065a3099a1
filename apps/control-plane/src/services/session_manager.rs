//! [apps/control-plane/src/services/session_manager.rs]
//! In-memory session table. Never persisted — a restart
//! starts with zero live sessions by design.

use std::collections::HashMap;

use chrono::Utc;
use nyx_domain_models::Session;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

pub struct SessionManager {
    sessions: Mutex<HashMap<String, Session>>,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), max_sessions }
    }

    /// Drops idle sessions past `Session::TIMEOUT_MINUTES`. Called at the
    /// top of every `create`/`get` — no background thread needed.
    fn gc(sessions: &mut HashMap<String, Session>) {
        let now = Utc::now();
        sessions.retain(|_, s| !s.is_expired(now));
    }

    /// `create(user_id, display_name)`: returns the caller's existing
    /// live session if one exists, else a fresh one if under the cap, else
    /// `None` — a 16th session is refused even with idle headroom elsewhere
    /// among the 15.
    #[instrument(skip(self))]
    pub async fn create(&self, user_id: &str, display_name: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        Self::gc(&mut sessions);

        if let Some(existing) = sessions.values_mut().find(|s| s.user_id == user_id) {
            existing.touch(Utc::now());
            return Some(existing.clone());
        }

        if sessions.len() >= self.max_sessions {
            return None;
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            created_at: now,
            last_active: now,
            active_client_id: None,
            message_count: 0,
            proposals_count: 0,
            approvals_count: 0,
        };
        sessions.insert(session.id.clone(), session.clone());
        Some(session)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        Self::gc(&mut sessions);
        let session = sessions.get_mut(session_id)?;
        session.touch(Utc::now());
        Some(session.clone())
    }

    #[instrument(skip(self))]
    pub async fn end(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    pub async fn set_active_client(&self, session_id: &str, client_id: Option<&str>) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.active_client_id = client_id.map(str::to_string);
                session.touch(Utc::now());
                true
            }
            None => false,
        }
    }

    pub async fn record_message(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.message_count += 1;
                session.touch(Utc::now());
                true
            }
            None => false,
        }
    }

    pub async fn record_booking(&self, session_id: &str, approved: bool) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.proposals_count += 1;
                if approved {
                    session.approvals_count += 1;
                }
                session.touch(Utc::now());
                true
            }
            None => false,
        }
    }

    pub async fn live_count(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        Self::gc(&mut sessions);
        sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_returns_the_existing_session_for_the_same_user() {
        let manager = SessionManager::new(15);
        let first = manager.create("ana", "Ana").await.unwrap();
        let second = manager.create("ana", "Ana").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn re_login_touches_the_existing_session() {
        let manager = SessionManager::new(15);
        let first = manager.create("ana", "Ana").await.unwrap();

        let stale_last_active = first.last_active - chrono::Duration::minutes(5);
        {
            let mut sessions = manager.sessions.lock().await;
            sessions.get_mut(&first.id).unwrap().last_active = stale_last_active;
        }

        let second = manager.create("ana", "Ana").await.unwrap();
        assert_eq!(second.id, first.id);
        assert!(second.last_active > stale_last_active);
    }

    #[tokio::test]
    async fn a_sixteenth_session_is_refused_even_when_all_others_are_idle() {
        let manager = SessionManager::new(15);
        for i in 0..15 {
            manager.create(&format!("user-{i}"), "Op").await.unwrap();
        }
        assert!(manager.create("user-15", "Op").await.is_none());
    }

    #[tokio::test]
    async fn record_booking_increments_counters() {
        let manager = SessionManager::new(15);
        let session = manager.create("ivan", "Ivan").await.unwrap();
        manager.record_booking(&session.id, true).await;
        let refreshed = manager.get(&session.id).await.unwrap();
        assert_eq!(refreshed.proposals_count, 1);
        assert_eq!(refreshed.approvals_count, 1);
    }
}
