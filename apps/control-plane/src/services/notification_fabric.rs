//! [apps/control-plane/src/services/notification_fabric.rs]
//! Per-user bounded notification deques with WebSocket fan-out. In-memory
//! only — deque lifetime is tied to the owning session.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use nyx_domain_models::notification::{Notification, NotificationTarget};
use tokio::sync::{mpsc, Mutex};
use tracing::instrument;

const USER_DEQUE_CAP: usize = 100;
const BROADCAST_HISTORY_CAP: usize = 200;
const BROADCAST_HISTORY_TRIM_TO: usize = 100;
const UNREAD_SNAPSHOT_LIMIT: usize = 20;

fn push_bounded(deque: &mut VecDeque<Notification>, notification: Notification, cap: usize) {
    if deque.len() >= cap {
        deque.pop_front();
    }
    deque.push_back(notification);
}

struct Connection {
    id: u64,
    sender: mpsc::UnboundedSender<Notification>,
}

pub struct NotificationFabric {
    deques: Mutex<HashMap<String, VecDeque<Notification>>>,
    broadcast_history: Mutex<VecDeque<Notification>>,
    connections: Mutex<HashMap<String, Vec<Connection>>>,
    role_members: Mutex<HashMap<String, Vec<String>>>,
    next_connection_id: AtomicU64,
}

impl NotificationFabric {
    pub fn new() -> Self {
        Self {
            deques: Mutex::new(HashMap::new()),
            broadcast_history: Mutex::new(VecDeque::new()),
            connections: Mutex::new(HashMap::new()),
            role_members: Mutex::new(HashMap::new()),
            next_connection_id: AtomicU64::new(0),
        }
    }

    pub async fn assign_role(&self, user_id: &str, role: &str) {
        let mut members = self.role_members.lock().await;
        let entry = members.entry(role.to_string()).or_default();
        if !entry.iter().any(|u| u == user_id) {
            entry.push(user_id.to_string());
        }
    }

    /// Registers a live WebSocket connection for `user_id` and returns the
    /// unread snapshot (last 20 unread) plus a receiver for subsequent
    /// pushes.
    #[instrument(skip(self))]
    pub async fn connect(&self, user_id: &str) -> (u64, mpsc::UnboundedReceiver<Notification>, Vec<Notification>) {
        let mut deques = self.deques.lock().await;
        let deque = deques.entry(user_id.to_string()).or_default();
        let snapshot: Vec<Notification> = deque.iter().rev().filter(|n| !n.read).take(UNREAD_SNAPSHOT_LIMIT).cloned().collect();
        drop(deques);

        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let mut connections = self.connections.lock().await;
        connections.entry(user_id.to_string()).or_default().push(Connection { id: connection_id, sender: tx });

        (connection_id, rx, snapshot)
    }

    /// Drops one WebSocket connection. The user's deque survives —
    /// disconnection is not the same as session end.
    pub async fn disconnect(&self, user_id: &str, connection_id: u64) {
        let mut connections = self.connections.lock().await;
        if let Some(live) = connections.get_mut(user_id) {
            live.retain(|c| c.id != connection_id);
            if live.is_empty() {
                connections.remove(user_id);
            }
        }
    }

    /// Tears down everything for a user whose session has ended — the
    /// fabric must not retain expired sessions' state.
    pub async fn drop_user(&self, user_id: &str) {
        self.deques.lock().await.remove(user_id);
        self.connections.lock().await.remove(user_id);
    }

    #[instrument(skip(self, notification))]
    pub async fn publish(&self, target: NotificationTarget, notification: Notification) {
        match target {
            NotificationTarget::Broadcast => {
                self.broadcast(notification).await;
            }
            NotificationTarget::User(user_id) => {
                self.deliver(&user_id, notification).await;
            }
            NotificationTarget::Role(role) => {
                let members = self.role_members.lock().await.get(&role).cloned().unwrap_or_default();
                if members.is_empty() {
                    // No role directory populated for this role: fall back
                    // to broadcast rather than silently dropping the
                    // notification.
                    self.broadcast(notification).await;
                    return;
                }
                for user_id in members {
                    self.deliver(&user_id, notification.clone()).await;
                }
            }
        }
    }

    async fn broadcast(&self, notification: Notification) {
        let mut history = self.broadcast_history.lock().await;
        push_bounded(&mut history, notification.clone(), BROADCAST_HISTORY_CAP);
        if history.len() > BROADCAST_HISTORY_TRIM_TO + 1 {
            while history.len() > BROADCAST_HISTORY_TRIM_TO {
                history.pop_front();
            }
        }
        drop(history);

        let user_ids: Vec<String> = self.deques.lock().await.keys().cloned().collect();
        for user_id in user_ids {
            self.deliver(&user_id, notification.clone()).await;
        }
    }

    async fn deliver(&self, user_id: &str, notification: Notification) {
        let mut deques = self.deques.lock().await;
        let deque = deques.entry(user_id.to_string()).or_default();
        push_bounded(deque, notification.clone(), USER_DEQUE_CAP);
        drop(deques);

        let connections = self.connections.lock().await;
        if let Some(live) = connections.get(user_id) {
            for connection in live {
                // Send failures are silently tolerated; the client
                // reconciles on reconnect.
                let _ = connection.sender.send(notification.clone());
            }
        }
    }
}

impl Default for NotificationFabric {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample(id: &str) -> Notification {
        Notification {
            id: id.to_string(),
            notification_type: "info".to_string(),
            title: "test".to_string(),
            message: "hello".to_string(),
            module: None,
            data: BTreeMap::new(),
            priority: nyx_domain_models::notification::NotificationPriority::Normal,
            read: false,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn a_targeted_notification_reaches_only_the_named_user() {
        let fabric = NotificationFabric::new();
        let (_id_a, mut rx_a, _) = fabric.connect("ana").await;
        let (_id_b, mut rx_b, _) = fabric.connect("ivan").await;

        fabric.publish(NotificationTarget::User("ana".to_string()), sample("n1")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connected_user() {
        let fabric = NotificationFabric::new();
        let (_id_a, mut rx_a, _) = fabric.connect("ana").await;
        let (_id_b, mut rx_b, _) = fabric.connect("ivan").await;

        fabric.publish(NotificationTarget::Broadcast, sample("n1")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn role_with_no_members_falls_back_to_broadcast() {
        let fabric = NotificationFabric::new();
        let (_id_a, mut rx_a, _) = fabric.connect("ana").await;
        let (_id_b, mut rx_b, _) = fabric.connect("ivan").await;

        fabric.publish(NotificationTarget::Role("accountant".to_string()), sample("n1")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn role_with_assigned_members_only_reaches_them() {
        let fabric = NotificationFabric::new();
        let (_id_a, mut rx_a, _) = fabric.connect("ana").await;
        let (_id_b, mut rx_b, _) = fabric.connect("ivan").await;
        fabric.assign_role("ana", "accountant").await;

        fabric.publish(NotificationTarget::Role("accountant".to_string()), sample("n1")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn the_deque_caps_at_one_hundred_oldest_evicted() {
        let fabric = NotificationFabric::new();
        let (_id, _rx, _) = fabric.connect("ana").await;
        for i in 0..150 {
            fabric.publish(NotificationTarget::User("ana".to_string()), sample(&format!("n{i}"))).await;
        }
        let deques = fabric.deques.lock().await;
        assert_eq!(deques.get("ana").unwrap().len(), USER_DEQUE_CAP);
    }
}
